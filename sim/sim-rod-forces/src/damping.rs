//! Linear viscous damping on free vertices.
//!
//! ```text
//! F_k      = −ν · (x_k − x0_k) / dt
//! ∂F_k/∂x_k = −ν / dt
//! ```
//!
//! Applied to the three translational DOFs of every vertex, skipping DOFs a
//! joint owns. The Jacobian is diagonal and independent of position.

use sim_rod::{
    validate_timestep, DofIndex, ForceAccumulator, LimbId, LocalDof, Result, RodLimb, SoftRobot,
    TRANSLATIONAL_DOFS,
};
use tracing::{debug, trace};

use crate::model::{EvaluationMode, ForceModel};
use crate::params::DampingParams;

/// Viscous drag proportional to per-step displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampingForce {
    params: DampingParams,
}

impl DampingForce {
    /// Create the damping model.
    pub fn new(params: DampingParams) -> Result<Self> {
        params.validate()?;
        debug!(viscosity = params.viscosity, "damping model created");
        Ok(Self { params })
    }

    /// The parameters the model was built with.
    #[must_use]
    pub fn params(&self) -> &DampingParams {
        &self.params
    }

    /// Viscosity `ν`.
    #[must_use]
    pub fn viscosity(&self) -> f64 {
        self.params.viscosity
    }

    fn accumulate(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
        mode: EvaluationMode,
    ) -> Result<()> {
        validate_timestep(dt)?;

        let jacobian = -self.params.viscosity / dt;
        for (limb_id, limb) in robot.limbs() {
            self.accumulate_limb(limb_id, limb, jacobian, sink, mode);
        }

        trace!(
            limbs = robot.num_limbs(),
            jacobian = mode.wants_jacobian(),
            "damping evaluated"
        );
        Ok(())
    }

    fn accumulate_limb(
        &self,
        limb_id: LimbId,
        limb: &RodLimb,
        jacobian: f64,
        sink: &mut dyn ForceAccumulator,
        mode: EvaluationMode,
    ) {
        for vertex in 0..limb.num_vertices() {
            for axis in 0..TRANSLATIONAL_DOFS {
                let dof = LocalDof::translational(vertex, axis);
                if limb.is_dof_joint(dof) {
                    continue;
                }

                let displacement = limb.dof(dof) - limb.pre_dof(dof);
                sink.add_force(DofIndex::new(limb_id, dof), jacobian * displacement);

                if mode.wants_jacobian() {
                    sink.add_jacobian(limb_id, dof, dof, jacobian);
                }
            }
        }
    }
}

impl ForceModel for DampingForce {
    type Report = ();

    fn compute_force(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
    ) -> Result<()> {
        self.accumulate(robot, dt, sink, EvaluationMode::Force)
    }

    fn compute_force_and_jacobian(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
    ) -> Result<()> {
        self.accumulate(robot, dt, sink, EvaluationMode::ForceAndJacobian)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use sim_rod::{DenseAccumulator, SimError};

    fn single_vertex_robot(from: Vector3<f64>, to: Vector3<f64>) -> SoftRobot {
        let mut limb = RodLimb::new(&[from], 0.001, 0.0).unwrap();
        limb.set_vertex(0, to).unwrap();
        let mut robot = SoftRobot::new();
        robot.add_limb(limb);
        robot
    }

    #[test]
    fn test_opposes_displacement() {
        let damping = DampingForce::new(DampingParams::new(0.01)).unwrap();
        let robot = single_vertex_robot(Vector3::zeros(), Vector3::new(0.05, 0.0, 0.0));
        let mut sink = DenseAccumulator::for_robot(&robot);
        damping.compute_force(&robot, 0.1, &mut sink).unwrap();

        let force = sink.force(LimbId::new(0)).unwrap();
        assert_relative_eq!(force[0], -0.005, epsilon = 1e-15);
        assert_eq!(force[1], 0.0);
        assert_eq!(force[2], 0.0);
    }

    #[test]
    fn test_jacobian_is_constant_diagonal() {
        let damping = DampingForce::new(DampingParams::new(0.2)).unwrap();
        let nodes = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.1, 0.0, 0.0),
            Vector3::new(0.2, 0.0, 0.0),
        ];
        let mut robot = SoftRobot::new();
        let limb = robot.add_limb(RodLimb::new(&nodes, 0.001, 0.0).unwrap());
        robot
            .limb_mut(limb)
            .unwrap()
            .set_vertex(1, Vector3::new(5.0, -3.0, 2.0))
            .unwrap();

        let mut sink = DenseAccumulator::for_robot(&robot);
        damping
            .compute_force_and_jacobian(&robot, 0.5, &mut sink)
            .unwrap();

        let jacobian = sink.jacobian(limb).unwrap();
        for row in 0..jacobian.nrows() {
            for col in 0..jacobian.ncols() {
                let expected = if row == col && row % 4 != 3 { -0.4 } else { 0.0 };
                assert_relative_eq!(jacobian[(row, col)], expected, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_joint_dofs_are_skipped() {
        let damping = DampingForce::new(DampingParams::new(1.0)).unwrap();
        let mut robot = single_vertex_robot(Vector3::zeros(), Vector3::new(0.1, 0.1, 0.1));
        robot
            .limb_mut(LimbId::new(0))
            .unwrap()
            .mark_joint_vertex(0)
            .unwrap();

        let mut sink = DenseAccumulator::for_robot(&robot);
        damping
            .compute_force_and_jacobian(&robot, 0.1, &mut sink)
            .unwrap();
        assert_eq!(sink.force(LimbId::new(0)).unwrap().norm(), 0.0);
        assert_eq!(sink.jacobian(LimbId::new(0)).unwrap().norm(), 0.0);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(DampingForce::new(DampingParams::new(-1.0))
            .unwrap_err()
            .is_config_error());

        let damping = DampingForce::new(DampingParams::default()).unwrap();
        let robot = single_vertex_robot(Vector3::zeros(), Vector3::x());
        let mut sink = DenseAccumulator::for_robot(&robot);
        assert_eq!(
            damping.compute_force(&robot, -0.1, &mut sink),
            Err(SimError::InvalidTimestep(-0.1))
        );
    }
}
