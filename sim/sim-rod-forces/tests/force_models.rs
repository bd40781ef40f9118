//! Behavioural tests for the rod force models.
//!
//! Scenarios are built on a near-flat floor (large cylinder around the x
//! axis) so that the surface normal under every vertex is +z and the
//! analytic Jacobian can be checked against central finite differences of
//! the forces the models actually write.

// Allow test-specific patterns
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector, Vector3};
use sim_rod_forces::{
    ContactDiagnostics, DampingForce, DampingParams, DenseAccumulator, DofIndex,
    FloorContactForce, FloorContactParams, ForceAccumulator, ForceModel, LimbId, LocalDof,
    RodLimb, SimError, SoftRobot,
};

const DELTA: f64 = 0.01;
const SLIP_TOLERANCE: f64 = 0.01;
const ROD_RADIUS: f64 = 0.001;
const FLOOR_RADIUS: f64 = 1000.0;

fn floor(mu: f64) -> FloorContactForce {
    FloorContactForce::new(
        FloorContactParams::flat_floor(DELTA, SLIP_TOLERANCE, 0.0)
            .with_cylinder(FLOOR_RADIUS, Vector3::x())
            .with_floor_mu(mu),
    )
    .unwrap()
}

/// Height of a node center whose gap to the floor is `gap`.
fn at_gap(gap: f64) -> f64 {
    gap + ROD_RADIUS
}

/// One-node robot that moved from `prev` to `curr` during the step.
fn single_node(curr: Vector3<f64>, prev: Vector3<f64>) -> SoftRobot {
    let mut limb = RodLimb::new(&[prev], ROD_RADIUS, 0.0).unwrap();
    limb.set_vertex(0, curr).unwrap();
    SoftRobot::from_iter([limb])
}

fn forces<M: ForceModel>(model: &M, robot: &SoftRobot, dt: f64) -> DVector<f64> {
    let mut sink = DenseAccumulator::for_robot(robot);
    model.compute_force(robot, dt, &mut sink).unwrap();
    sink.force(LimbId::new(0)).unwrap().clone()
}

fn jacobian<M: ForceModel>(model: &M, robot: &SoftRobot, dt: f64) -> DMatrix<f64> {
    let mut sink = DenseAccumulator::for_robot(robot);
    model
        .compute_force_and_jacobian(robot, dt, &mut sink)
        .unwrap();
    sink.jacobian(LimbId::new(0)).unwrap().clone()
}

/// Central differences of the translational force block of node 0.
fn finite_difference_block<M: ForceModel>(
    model: &M,
    curr: Vector3<f64>,
    prev: Vector3<f64>,
    dt: f64,
) -> DMatrix<f64> {
    // z is measured from an axis R below the floor, so it needs a larger
    // step to stay clear of roundoff.
    let steps = [1e-9, 1e-9, 1e-7];
    let mut block = DMatrix::zeros(3, 3);
    for (col, h) in steps.into_iter().enumerate() {
        let mut plus = curr;
        let mut minus = curr;
        plus[col] += h;
        minus[col] -= h;
        let f_plus = forces(model, &single_node(plus, prev), dt);
        let f_minus = forces(model, &single_node(minus, prev), dt);
        for row in 0..3 {
            block[(row, col)] = (f_plus[row] - f_minus[row]) / (2.0 * h);
        }
    }
    block
}

fn assert_block_matches(analytic: &DMatrix<f64>, fd: &DMatrix<f64>, max_relative: f64) {
    for row in 0..3 {
        for col in 0..3 {
            assert_relative_eq!(
                analytic[(row, col)],
                fd[(row, col)],
                max_relative = max_relative,
                epsilon = 1e-5
            );
        }
    }
}

// =============================================================================
// Worked scenarios
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn damping_opposes_motion() {
        let damping = DampingForce::new(DampingParams::new(0.01)).unwrap();
        let robot = single_node(Vector3::new(0.05, 0.0, 0.0), Vector3::zeros());

        let f = forces(&damping, &robot, 0.1);
        assert_relative_eq!(f[0], -0.005, epsilon = 1e-15);
        assert_eq!(f[1], 0.0);
        assert_eq!(f[2], 0.0);
    }

    #[test]
    fn frictionless_contact_pushes_straight_up() {
        let contact = floor(0.0);
        let robot = single_node(
            Vector3::new(0.01, 0.0, at_gap(0.005)),
            Vector3::new(0.0, 0.0, at_gap(0.005)),
        );
        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = contact.compute_force(&robot, 0.01, &mut sink).unwrap();

        let f = sink.force(LimbId::new(0)).unwrap();
        assert_eq!(report.num_contacts, 1);
        assert!(f[2] > 0.0);
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], 0.0);
    }

    #[test]
    fn separated_node_is_ignored_but_measured() {
        let contact = floor(0.5);
        let robot = single_node(
            Vector3::new(0.01, 0.0, at_gap(0.02)),
            Vector3::new(0.0, 0.0, at_gap(0.02)),
        );
        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = contact
            .compute_force_and_jacobian(&robot, 0.01, &mut sink)
            .unwrap();

        assert_eq!(report.num_contacts, 0);
        assert_relative_eq!(report.min_dist, 0.02, epsilon = 1e-9);
        assert!(sink.force(LimbId::new(0)).unwrap().iter().all(|&v| v == 0.0));
        assert!(sink.jacobian(LimbId::new(0)).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn sliding_friction_is_full_coulomb() {
        let mu = 0.5;
        let dt = 0.1;
        let contact = floor(mu);
        // |vel| = |(0.0012, 0.0016)| / 0.1 = 0.02 = 2 × slip tolerance
        let robot = single_node(
            Vector3::new(0.0012, 0.0, at_gap(0.004)),
            Vector3::new(0.0, -0.0016, at_gap(0.004)),
        );

        let f = forces(&contact, &robot, dt);
        let normal = f[2];
        let friction = nalgebra::Vector2::new(f[0], f[1]);
        assert!(normal > 0.0);
        assert_relative_eq!(friction.norm(), mu * normal, max_relative = 1e-12);
        assert_relative_eq!(
            friction / friction.norm(),
            -nalgebra::Vector2::new(0.6, 0.8),
            epsilon = 1e-12
        );
    }
}

// =============================================================================
// Contact law properties
// =============================================================================

mod contact_law {
    use super::*;

    #[test]
    fn exactly_zero_beyond_delta() {
        let contact = floor(0.0);
        let just_outside = single_node(
            Vector3::new(0.0, 0.0, at_gap(DELTA * 1.01)),
            Vector3::new(0.0, 0.0, at_gap(DELTA * 1.01)),
        );
        let just_inside = single_node(
            Vector3::new(0.0, 0.0, at_gap(DELTA * 0.9)),
            Vector3::new(0.0, 0.0, at_gap(DELTA * 0.9)),
        );

        assert_eq!(forces(&contact, &just_outside, 0.01)[2], 0.0);
        assert!(jacobian(&contact, &just_outside, 0.01)
            .iter()
            .all(|&v| v == 0.0));
        assert!(forces(&contact, &just_inside, 0.01)[2] > 0.0);
    }

    #[test]
    fn force_grows_as_gap_closes() {
        let contact = floor(0.0);
        let mut previous = 0.0;
        for step in (0..40).rev() {
            let gap = DELTA * f64::from(step) / 40.0;
            let p = Vector3::new(0.0, 0.0, at_gap(gap));
            let f = forces(&contact, &single_node(p, p), 0.01)[2];
            assert!(f >= previous, "force decreased at gap {gap}");
            previous = f;
        }
    }

    #[test]
    fn keeps_pushing_when_penetrating() {
        let contact = floor(0.0);
        let touching = Vector3::new(0.0, 0.0, at_gap(0.0));
        let inside = Vector3::new(0.0, 0.0, at_gap(-0.002));
        let f_touch = forces(&contact, &single_node(touching, touching), 0.01)[2];
        let f_inside = forces(&contact, &single_node(inside, inside), 0.01)[2];
        assert!(f_inside > f_touch);

        let mut sink = DenseAccumulator::for_robot(&single_node(inside, inside));
        let report = contact
            .compute_force(&single_node(inside, inside), 0.01, &mut sink)
            .unwrap();
        assert!(report.is_penetrating());
    }
}

// =============================================================================
// Friction regimes through the full model
// =============================================================================

mod friction {
    use super::*;

    #[test]
    fn no_friction_at_rest() {
        let contact = floor(0.8);
        let p = Vector3::new(0.3, 0.0, at_gap(0.002));
        let f = forces(&contact, &single_node(p, p), 0.01);
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], 0.0);
        assert!(f.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn continuous_at_slip_tolerance() {
        let mu = 0.4;
        let dt = 0.01;
        let contact = floor(mu);
        let z = at_gap(0.003);
        let friction_at = |speed: f64| {
            let robot = single_node(Vector3::new(speed * dt, 0.0, z), Vector3::new(0.0, 0.0, z));
            let f = forces(&contact, &robot, dt);
            -f[0] / (mu * f[2])
        };

        let below = friction_at(SLIP_TOLERANCE * (1.0 - 1e-9));
        let above = friction_at(SLIP_TOLERANCE * (1.0 + 1e-9));
        assert_relative_eq!(above, 1.0, max_relative = 1e-12);
        assert_relative_eq!(below, above, epsilon = 1e-6);

        let slow = friction_at(SLIP_TOLERANCE * 0.05);
        assert!(slow > 0.0 && slow < 1.0);
    }

    #[test]
    fn limb_mu_overrides_smaller_floor_mu() {
        let contact = floor(0.1);
        let z = at_gap(0.003);
        let mut limb = RodLimb::new(&[Vector3::new(0.0, 0.0, z)], ROD_RADIUS, 0.6).unwrap();
        limb.set_vertex(0, Vector3::new(0.01, 0.0, z)).unwrap();
        let robot = SoftRobot::from_iter([limb]);

        let f = forces(&contact, &robot, 0.01);
        assert_relative_eq!(-f[0], 0.6 * f[2], max_relative = 1e-12);
    }
}

// =============================================================================
// Jacobian against finite differences
// =============================================================================

mod jacobian {
    use super::*;

    #[test]
    fn force_identical_in_both_modes() {
        let contact = floor(0.5);
        let damping = DampingForce::new(DampingParams::new(0.05)).unwrap();
        let nodes = [
            Vector3::new(0.0, 0.0, at_gap(0.004)),
            Vector3::new(0.1, 0.0, at_gap(0.001)),
            Vector3::new(0.2, 0.0, at_gap(0.03)),
            Vector3::new(0.3, 0.0, at_gap(-0.001)),
        ];
        let mut limb = RodLimb::new(&nodes, ROD_RADIUS, 0.0).unwrap();
        limb.set_vertex(1, Vector3::new(0.1002, 0.0001, at_gap(0.001)))
            .unwrap();
        limb.set_vertex(3, Vector3::new(0.300_001, 0.0, at_gap(-0.001)))
            .unwrap();
        let robot = SoftRobot::from_iter([limb]);

        let dt = 0.01;
        let mut force_only = DenseAccumulator::for_robot(&robot);
        let mut with_jacobian = DenseAccumulator::for_robot(&robot);
        let a = contact.compute_force(&robot, dt, &mut force_only).unwrap();
        let b = contact
            .compute_force_and_jacobian(&robot, dt, &mut with_jacobian)
            .unwrap();
        damping.compute_force(&robot, dt, &mut force_only).unwrap();
        damping
            .compute_force_and_jacobian(&robot, dt, &mut with_jacobian)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.num_contacts, 3);
        assert_eq!(
            force_only.force(LimbId::new(0)).unwrap(),
            with_jacobian.force(LimbId::new(0)).unwrap()
        );
        assert!(force_only
            .jacobian(LimbId::new(0))
            .unwrap()
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn sliding_block_matches_finite_difference() {
        let contact = floor(0.5);
        let dt = 0.01;
        // Keep the current node on y = 0 so the normal stays exactly +z.
        let prev = Vector3::new(-0.0002, -0.0001, at_gap(0.003));
        let curr = Vector3::new(0.0, 0.0, at_gap(0.003));

        let analytic = jacobian(&contact, &single_node(curr, prev), dt)
            .view((0, 0), (3, 3))
            .into_owned();
        let fd = finite_difference_block(&contact, curr, prev, dt);
        assert_block_matches(&analytic, &fd, 1e-4);
    }

    #[test]
    fn transitional_block_matches_finite_difference() {
        let contact = floor(0.5);
        let dt = 0.01;
        // speed 5e-4, a twentieth of the slip tolerance
        let prev = Vector3::new(-3e-6, -4e-6, at_gap(0.003));
        let curr = Vector3::new(0.0, 0.0, at_gap(0.003));

        let analytic = jacobian(&contact, &single_node(curr, prev), dt)
            .view((0, 0), (3, 3))
            .into_owned();
        let fd = finite_difference_block(&contact, curr, prev, dt);
        assert_block_matches(&analytic, &fd, 1e-3);
    }

    #[test]
    fn frictionless_block_is_normal_stiffness_only() {
        let contact = floor(0.0);
        let p = Vector3::new(0.0, 0.0, at_gap(0.002));
        let analytic = jacobian(&contact, &single_node(p, p), 0.01)
            .view((0, 0), (3, 3))
            .into_owned();
        let fd = finite_difference_block(&contact, p, p, 0.01);

        assert!(analytic[(2, 2)] < 0.0);
        assert_block_matches(&analytic, &fd, 1e-4);
    }

    #[test]
    fn damping_jacobian_is_position_independent() {
        let damping = DampingForce::new(DampingParams::new(0.3)).unwrap();
        let near = single_node(Vector3::new(0.1, 0.2, 0.3), Vector3::zeros());
        let far = single_node(Vector3::new(-40.0, 7.0, 1e3), Vector3::new(1.0, 1.0, 1.0));

        let j_near = jacobian(&damping, &near, 0.02);
        let j_far = jacobian(&damping, &far, 0.02);
        assert_eq!(j_near, j_far);
        for k in 0..3 {
            assert_relative_eq!(j_near[(k, k)], -0.3 / 0.02, epsilon = 1e-12);
        }
    }
}

// =============================================================================
// Robot structure
// =============================================================================

mod structure {
    use super::*;

    #[test]
    fn joint_nodes_are_left_alone() {
        let contact = floor(0.5);
        let damping = DampingForce::new(DampingParams::new(1.0)).unwrap();
        let nodes = [
            Vector3::new(0.0, 0.0, at_gap(-0.003)),
            Vector3::new(0.1, 0.0, at_gap(0.005)),
        ];
        let mut limb = RodLimb::new(&nodes, ROD_RADIUS, 0.0).unwrap();
        limb.set_vertex(0, Vector3::new(0.01, 0.0, at_gap(-0.003)))
            .unwrap();
        limb.mark_joint_vertex(0).unwrap();
        let robot = SoftRobot::from_iter([limb]);

        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = contact
            .compute_force_and_jacobian(&robot, 0.01, &mut sink)
            .unwrap();
        damping
            .compute_force_and_jacobian(&robot, 0.01, &mut sink)
            .unwrap();

        assert_eq!(report.num_contacts, 1);
        assert_relative_eq!(report.min_dist, 0.005, epsilon = 1e-9);
        let f = sink.force(LimbId::new(0)).unwrap();
        let j = sink.jacobian(LimbId::new(0)).unwrap();
        for k in 0..3 {
            assert_eq!(f[k], 0.0);
            assert!(j.row(k).iter().all(|&v| v == 0.0));
        }
        assert!(f[6] > 0.0);
    }

    #[test]
    fn twist_dofs_are_never_written() {
        let contact = floor(0.5);
        let damping = DampingForce::new(DampingParams::new(1.0)).unwrap();
        let nodes = [
            Vector3::new(0.0, 0.0, at_gap(0.002)),
            Vector3::new(0.1, 0.0, at_gap(0.002)),
            Vector3::new(0.2, 0.0, at_gap(0.002)),
        ];
        let mut limb = RodLimb::new(&nodes, ROD_RADIUS, 0.0).unwrap();
        for (i, node) in nodes.iter().enumerate() {
            limb.set_vertex(i, node + Vector3::new(0.001, 0.002, 0.0))
                .unwrap();
        }
        limb.set_dof(LocalDof::twist(0), 0.3).unwrap();
        limb.set_dof(LocalDof::twist(1), -0.2).unwrap();
        let robot = SoftRobot::from_iter([limb]);

        let mut sink = DenseAccumulator::for_robot(&robot);
        contact
            .compute_force_and_jacobian(&robot, 0.01, &mut sink)
            .unwrap();
        damping
            .compute_force_and_jacobian(&robot, 0.01, &mut sink)
            .unwrap();

        let f = sink.force(LimbId::new(0)).unwrap();
        let j = sink.jacobian(LimbId::new(0)).unwrap();
        for twist in [3, 7] {
            assert_eq!(f[twist], 0.0);
            assert!(j.row(twist).iter().all(|&v| v == 0.0));
            assert!(j.column(twist).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn limbs_receive_their_own_contributions() {
        let contact = floor(0.0);
        let grounded = RodLimb::new(&[Vector3::new(0.0, 0.0, at_gap(0.001))], ROD_RADIUS, 0.0)
            .unwrap();
        let airborne = RodLimb::new(&[Vector3::new(0.0, 1.0, 0.5)], ROD_RADIUS, 0.0).unwrap();
        let robot = SoftRobot::from_iter([airborne, grounded]);

        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = contact.compute_force(&robot, 0.01, &mut sink).unwrap();

        assert_eq!(report.num_contacts, 1);
        assert_eq!(sink.force(LimbId::new(0)).unwrap().norm(), 0.0);
        assert!(sink.force(LimbId::new(1)).unwrap()[2] > 0.0);
    }

    #[test]
    fn empty_robot_reports_sentinel() {
        let contact = floor(0.5);
        let robot = SoftRobot::new();
        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = contact.compute_force(&robot, 0.01, &mut sink).unwrap();
        assert_eq!(report, ContactDiagnostics::default());
        assert_eq!(report.min_dist, 1e7);
    }
}

// =============================================================================
// Custom sinks and input validation
// =============================================================================

mod sinks {
    use super::*;

    /// Records every write in order, like a sparse triplet assembler would.
    #[derive(Default)]
    struct TripletSink {
        forces: Vec<(DofIndex, f64)>,
        jacobian: Vec<(LimbId, LocalDof, LocalDof, f64)>,
    }

    impl ForceAccumulator for TripletSink {
        fn add_force(&mut self, dof: DofIndex, value: f64) {
            self.forces.push((dof, value));
        }

        fn add_jacobian(&mut self, limb: LimbId, row: LocalDof, col: LocalDof, value: f64) {
            self.jacobian.push((limb, row, col, value));
        }
    }

    #[test]
    fn sliding_contact_writes_expected_entries() {
        let contact = floor(0.5);
        let prev = Vector3::new(0.0, 0.0, at_gap(0.003));
        let curr = Vector3::new(0.0005, 0.0, at_gap(0.003));
        let robot = single_node(curr, prev);

        let mut sink = TripletSink::default();
        contact
            .compute_force_and_jacobian(&robot, 0.01, &mut sink)
            .unwrap();

        // Three normal components plus two friction components.
        assert_eq!(sink.forces.len(), 5);
        // Three diagonal normal entries, four in-plane friction entries and
        // two friction-to-height couplings.
        assert_eq!(sink.jacobian.len(), 9);
        assert!(sink
            .jacobian
            .iter()
            .all(|(limb, row, col, _)| *limb == LimbId::new(0)
                && row.is_translational()
                && col.is_translational()));
        assert!(sink
            .jacobian
            .iter()
            .any(|(_, row, col, _)| row.raw() == 0 && col.raw() == 2));
    }

    #[test]
    fn invalid_timestep_writes_nothing() {
        let contact = floor(0.5);
        let damping = DampingForce::new(DampingParams::default()).unwrap();
        let robot = single_node(
            Vector3::new(0.001, 0.0, at_gap(0.002)),
            Vector3::new(0.0, 0.0, at_gap(0.002)),
        );

        for dt in [0.0, -1e-3, f64::NAN, f64::INFINITY] {
            let mut sink = TripletSink::default();
            let err = contact.compute_force_and_jacobian(&robot, dt, &mut sink);
            assert!(matches!(err, Err(SimError::InvalidTimestep(_))));
            let err = damping.compute_force(&robot, dt, &mut sink);
            assert!(matches!(err, Err(SimError::InvalidTimestep(_))));
            assert!(sink.forces.is_empty());
            assert!(sink.jacobian.is_empty());
        }
    }
}
