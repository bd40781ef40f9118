//! Smooth penalty contact against a cylindrical floor, with friction.
//!
//! The floor is an infinite cylinder; with a very large radius the patch
//! under the robot is effectively flat. For every non-joint vertex within δ
//! of the surface the model writes:
//!
//! - a radial normal force `fn · n` from the [`SmoothNormalForce`] law;
//! - a regularized Coulomb friction force in the x-y plane;
//! - in Jacobian mode, the diagonal of the contact Jacobian and the full
//!   in-plane friction block plus its coupling to the normal force.
//!
//! # Geometry
//!
//! ```text
//! r   = p − c                      c = (0, 0, floor_z − R) lies on the axis
//! q   = r − (r·a)·a                radial part, a = unit axis
//! ρ   = |q|
//! gap = ρ − R − rod_radius
//! n   = q / ρ                      outward normal
//! ```
//!
//! # Jacobian Structure
//!
//! For vertex `i` with translational DOFs `4i + k`:
//!
//! ```text
//! (4i+k, 4i+k)  +=  dfn/dgap · n_k                   k = 0, 1, 2
//! (4i+a, 4i+b)  +=  ∂fr_a/∂x_b                        a, b = 0, 1
//! (4i+a, 4i+2)  +=  ∂fr_a/∂fn · dfn/dgap              a = 0, 1
//! ```
//!
//! Cross-axis terms of the contact force (and the curvature term
//! `fn·(I − n·nᵀ)/ρ`) are not written. On a flat floor `n = +z`, both vanish
//! at the contact patch.

use nalgebra::Vector3;
use sim_rod::{
    validate_timestep, DofIndex, ForceAccumulator, LimbId, LocalDof, Result, RodLimb, SimError,
    SoftRobot,
};
use tracing::{debug, trace, warn};

use crate::friction::{FrictionRegime, FrictionState, RegularizedFloorFriction};
use crate::model::{EvaluationMode, ForceModel};
use crate::normal::{NormalForce, SmoothNormalForce};
use crate::params::FloorContactParams;
use crate::partials::{ClosedFormPartials, FrictionPartialsBackend};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Initial value of [`ContactDiagnostics::min_dist`] before any vertex is seen.
pub const MIN_DIST_SENTINEL: f64 = 1e7;

/// Per-call contact diagnostics.
///
/// Fresh for every call, never accumulated across calls.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactDiagnostics {
    /// Smallest gap over all non-joint vertices, including those outside
    /// the contact band. [`MIN_DIST_SENTINEL`] if there were none.
    pub min_dist: f64,
    /// Number of vertices within δ of the surface.
    pub num_contacts: usize,
}

impl Default for ContactDiagnostics {
    fn default() -> Self {
        Self {
            min_dist: MIN_DIST_SENTINEL,
            num_contacts: 0,
        }
    }
}

impl ContactDiagnostics {
    /// Whether any vertex was in contact.
    #[must_use]
    pub fn has_contacts(&self) -> bool {
        self.num_contacts > 0
    }

    /// Whether any vertex penetrates the surface.
    #[must_use]
    pub fn is_penetrating(&self) -> bool {
        self.min_dist < 0.0
    }

    fn observe_gap(&mut self, gap: f64) {
        if gap < self.min_dist {
            self.min_dist = gap;
        }
    }
}

/// Distance of a vertex to the cylindrical surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGap {
    /// Signed gap (negative: penetration).
    pub gap: f64,
    /// Distance from the cylinder axis.
    pub radial_distance: f64,
    /// Radial component of the vertex position relative to the axis.
    pub radial: Vector3<f64>,
}

impl SurfaceGap {
    /// Outward surface normal, or `None` on the axis itself.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        (self.radial_distance > 0.0).then(|| self.radial / self.radial_distance)
    }
}

/// Contact and friction against a cylindrical floor.
///
/// # Example
///
/// ```
/// use sim_rod::{DenseAccumulator, RodLimb, SoftRobot};
/// use sim_rod_forces::{FloorContactForce, FloorContactParams, ForceModel};
/// use nalgebra::Vector3;
///
/// let contact = FloorContactForce::new(FloorContactParams::flat_floor(0.01, 0.01, 0.0)).unwrap();
///
/// let mut robot = SoftRobot::new();
/// let limb = robot.add_limb(
///     RodLimb::new(&[Vector3::new(0.0, 0.0, 0.01), Vector3::new(0.1, 0.0, 0.5)], 0.005, 0.0)
///         .unwrap(),
/// );
///
/// let mut sink = DenseAccumulator::for_robot(&robot);
/// let report = contact.compute_force(&robot, 1e-3, &mut sink).unwrap();
///
/// assert_eq!(report.num_contacts, 1);
/// assert!(sink.force(limb).unwrap()[2] > 0.0); // pushed up
/// assert_eq!(sink.force(limb).unwrap()[6], 0.0); // second node is airborne
/// ```
#[derive(Debug, Clone)]
pub struct FloorContactForce<B = ClosedFormPartials> {
    params: FloorContactParams,
    /// Unit cylinder axis.
    axis: Vector3<f64>,
    /// Point on the cylinder axis.
    anchor: Vector3<f64>,
    normal_law: SmoothNormalForce,
    friction: RegularizedFloorFriction,
    backend: B,
}

impl FloorContactForce<ClosedFormPartials> {
    /// Create the model with the closed-form friction partials.
    pub fn new(params: FloorContactParams) -> Result<Self> {
        Self::with_backend(params, ClosedFormPartials::new())
    }
}

impl<B: FrictionPartialsBackend> FloorContactForce<B> {
    /// Create the model with a custom friction partials backend.
    pub fn with_backend(params: FloorContactParams, backend: B) -> Result<Self> {
        params.validate()?;

        let axis = params.cylinder_axis.normalize();
        let anchor = Vector3::new(0.0, 0.0, params.floor_z - params.cylinder_radius);
        let normal_law = SmoothNormalForce::new(params.k1(), params.contact_stiffness);
        let friction = RegularizedFloorFriction::new(params.slip_tolerance);

        debug!(
            delta = params.delta,
            slip_tolerance = params.slip_tolerance,
            cylinder_radius = params.cylinder_radius,
            floor_mu = params.floor_mu,
            k1 = normal_law.k1,
            k2 = friction.k2,
            "floor contact model created"
        );

        Ok(Self {
            params,
            axis,
            anchor,
            normal_law,
            friction,
            backend,
        })
    }

    /// The parameters the model was built with.
    #[must_use]
    pub fn params(&self) -> &FloorContactParams {
        &self.params
    }

    /// The smoothed normal force law.
    #[must_use]
    pub fn normal_law(&self) -> &SmoothNormalForce {
        &self.normal_law
    }

    /// The regularized friction law.
    #[must_use]
    pub fn friction(&self) -> &RegularizedFloorFriction {
        &self.friction
    }

    /// Unit cylinder axis.
    #[must_use]
    pub fn axis(&self) -> &Vector3<f64> {
        &self.axis
    }

    /// Friction coefficient used for vertices of `limb`.
    #[must_use]
    pub fn effective_mu(&self, limb: &RodLimb) -> f64 {
        self.params.floor_mu.max(limb.mu())
    }

    /// Gap between a rod of radius `rod_radius` centred at `position` and
    /// the cylinder surface.
    #[must_use]
    pub fn surface_gap(&self, position: &Vector3<f64>, rod_radius: f64) -> SurfaceGap {
        let relative = position - self.anchor;
        let radial = relative - self.axis * relative.dot(&self.axis);
        let radial_distance = radial.norm();
        SurfaceGap {
            gap: radial_distance - self.params.cylinder_radius - rod_radius,
            radial_distance,
            radial,
        }
    }

    fn accumulate(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
        mode: EvaluationMode,
    ) -> Result<ContactDiagnostics> {
        validate_timestep(dt)?;

        let mut diagnostics = ContactDiagnostics::default();
        for (limb_id, limb) in robot.limbs() {
            let mu = self.effective_mu(limb);
            for i in 0..limb.num_vertices() {
                if limb.is_joint_vertex(i) {
                    continue;
                }

                let surface = self.surface_gap(&limb.vertex(i), limb.rod_radius());
                diagnostics.observe_gap(surface.gap);
                if surface.gap > self.params.delta {
                    continue;
                }
                let Some(normal) = surface.normal() else {
                    continue;
                };

                let contact = self.normal_law.evaluate(surface.gap);
                if !contact.magnitude.is_finite() || !contact.d_magnitude_d_gap.is_finite() {
                    warn!(
                        limb = limb_id.raw(),
                        vertex = i,
                        gap = surface.gap,
                        "non-finite floor contact force"
                    );
                    return Err(SimError::diverged(format!(
                        "floor contact force at {limb_id} vertex {i} is not finite (gap {})",
                        surface.gap
                    )));
                }

                self.apply_contact(sink, limb_id, i, &normal, &contact, mode);
                if mu != 0.0 {
                    self.apply_friction(sink, limb_id, limb, i, &contact, mu, dt, mode);
                }

                diagnostics.num_contacts += 1;
            }
        }

        trace!(
            min_dist = diagnostics.min_dist,
            num_contacts = diagnostics.num_contacts,
            jacobian = mode.wants_jacobian(),
            "floor contact evaluated"
        );
        Ok(diagnostics)
    }

    fn apply_contact(
        &self,
        sink: &mut dyn ForceAccumulator,
        limb: LimbId,
        vertex: usize,
        normal: &Vector3<f64>,
        contact: &NormalForce,
        mode: EvaluationMode,
    ) {
        for axis in 0..3 {
            sink.add_force(
                DofIndex::translational(limb, vertex, axis),
                contact.magnitude * normal[axis],
            );
        }

        if mode.wants_jacobian() {
            // dgap/dx = n
            let df_dx = normal * contact.d_magnitude_d_gap;
            for axis in 0..3 {
                let dof = LocalDof::translational(vertex, axis);
                sink.add_jacobian(limb, dof, dof, df_dx[axis]);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_friction(
        &self,
        sink: &mut dyn ForceAccumulator,
        limb_id: LimbId,
        limb: &RodLimb,
        vertex: usize,
        contact: &NormalForce,
        mu: f64,
        dt: f64,
        mode: EvaluationMode,
    ) {
        let curr = limb.vertex(vertex).xy();
        let prev = limb.pre_vertex(vertex).xy();
        let FrictionState { regime, force } =
            self.friction.evaluate(&curr, &prev, contact.magnitude, mu, dt);

        if regime == FrictionRegime::Static {
            return;
        }

        for axis in 0..2 {
            sink.add_force(DofIndex::translational(limb_id, vertex, axis), force[axis]);
        }

        if !mode.wants_jacobian() {
            return;
        }

        let input = self
            .friction
            .jacobian_input(&curr, &prev, contact.magnitude, mu, dt);
        let Some(partials) = regime.partials(&self.backend, &input) else {
            return;
        };

        let height = LocalDof::translational(vertex, 2);
        for a in 0..2 {
            let row = LocalDof::translational(vertex, a);
            for b in 0..2 {
                sink.add_jacobian(
                    limb_id,
                    row,
                    LocalDof::translational(vertex, b),
                    partials.dfr_dx[(a, b)],
                );
            }
            sink.add_jacobian(
                limb_id,
                row,
                height,
                partials.dfr_dfn[a] * contact.d_magnitude_d_gap,
            );
        }
    }
}

impl<B: FrictionPartialsBackend> ForceModel for FloorContactForce<B> {
    type Report = ContactDiagnostics;

    fn compute_force(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
    ) -> Result<ContactDiagnostics> {
        self.accumulate(robot, dt, sink, EvaluationMode::Force)
    }

    fn compute_force_and_jacobian(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
    ) -> Result<ContactDiagnostics> {
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
    use sim_rod::DenseAccumulator;

    const ROD_RADIUS: f64 = 0.001;

    fn flat_params() -> FloorContactParams {
        FloorContactParams::flat_floor(0.01, 0.01, 0.0).with_cylinder(1000.0, Vector3::x())
    }

    fn robot_with(nodes: &[Vector3<f64>], mu: f64) -> SoftRobot {
        let mut robot = SoftRobot::new();
        robot.add_limb(RodLimb::new(nodes, ROD_RADIUS, mu).unwrap());
        robot
    }

    /// Height at which a node's gap to the flat floor equals `gap`.
    fn height_for_gap(gap: f64) -> f64 {
        gap + ROD_RADIUS
    }

    #[test]
    fn test_surface_gap_flat_floor() {
        let model = FloorContactForce::new(flat_params()).unwrap();
        let surface = model.surface_gap(&Vector3::new(0.4, 0.0, 0.003), ROD_RADIUS);
        assert_relative_eq!(surface.gap, 0.002, epsilon = 1e-9);
        assert_relative_eq!(surface.normal().unwrap(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_raised_floor_anchors_axis_below_floor_z() {
        // Axis through (0, 0, 0.5 − 100): the top of the surface sits at z = 0.5.
        let params =
            FloorContactParams::flat_floor(0.01, 0.01, 0.5).with_cylinder(100.0, Vector3::x());
        let model = FloorContactForce::new(params).unwrap();

        let on_top = model.surface_gap(&Vector3::new(3.0, 0.0, 0.503), ROD_RADIUS);
        assert_relative_eq!(on_top.gap, 0.002, epsilon = 1e-9);
        assert_relative_eq!(on_top.radial_distance, 100.003, epsilon = 1e-9);
        assert_relative_eq!(on_top.normal().unwrap(), Vector3::z(), epsilon = 1e-12);

        // A node at the origin is half a metre inside the raised floor.
        let at_origin = model.surface_gap(&Vector3::zeros(), ROD_RADIUS);
        assert_relative_eq!(at_origin.gap, -0.501, epsilon = 1e-9);

        let robot = robot_with(&[Vector3::new(0.0, 0.0, 0.505)], 0.0);
        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = model.compute_force(&robot, 1e-3, &mut sink).unwrap();
        assert_eq!(report.num_contacts, 1);
        assert_relative_eq!(report.min_dist, 0.004, epsilon = 1e-9);
    }

    #[test]
    fn test_surface_gap_vertical_axis() {
        let params = FloorContactParams::new(0.01, 0.01, 0.0).with_cylinder(1.0, Vector3::z());
        let model = FloorContactForce::new(params).unwrap();
        let surface = model.surface_gap(&Vector3::new(0.0, 1.5, 7.0), 0.1);
        assert_relative_eq!(surface.gap, 0.4, epsilon = 1e-12);
        assert_relative_eq!(surface.normal().unwrap(), Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_axis_is_normalized() {
        let params = flat_params().with_cylinder(1000.0, Vector3::new(3.0, 0.0, 0.0));
        let model = FloorContactForce::new(params).unwrap();
        assert_relative_eq!(model.axis().norm(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_rejects_invalid_params() {
        let err = FloorContactForce::new(FloorContactParams::new(0.0, 0.01, 0.0)).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_rejects_bad_timestep() {
        let model = FloorContactForce::new(flat_params()).unwrap();
        let robot = robot_with(&[Vector3::new(0.0, 0.0, 0.002)], 0.0);
        let mut sink = DenseAccumulator::for_robot(&robot);
        assert_eq!(
            model.compute_force(&robot, 0.0, &mut sink),
            Err(SimError::InvalidTimestep(0.0))
        );
        assert_eq!(sink.force(LimbId::new(0)).unwrap().norm(), 0.0);
    }

    #[test]
    fn test_effective_mu_takes_maximum() {
        let model = FloorContactForce::new(flat_params().with_floor_mu(0.3)).unwrap();
        let slippery = RodLimb::new(&[Vector3::zeros()], ROD_RADIUS, 0.1).unwrap();
        let grippy = RodLimb::new(&[Vector3::zeros()], ROD_RADIUS, 0.9).unwrap();
        assert_eq!(model.effective_mu(&slippery), 0.3);
        assert_eq!(model.effective_mu(&grippy), 0.9);
    }

    #[test]
    fn test_separated_vertex_contributes_nothing() {
        let model = FloorContactForce::new(flat_params().with_floor_mu(0.5)).unwrap();
        let mut robot = robot_with(&[Vector3::new(0.0, 0.0, height_for_gap(0.02))], 0.0);
        robot
            .limb_mut(LimbId::new(0))
            .unwrap()
            .set_pre_vertex(0, Vector3::new(-0.1, 0.0, height_for_gap(0.02)))
            .unwrap();

        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = model
            .compute_force_and_jacobian(&robot, 1e-3, &mut sink)
            .unwrap();

        assert_eq!(report.num_contacts, 0);
        assert_relative_eq!(report.min_dist, 0.02, epsilon = 1e-9);
        assert_eq!(sink.force(LimbId::new(0)).unwrap().norm(), 0.0);
        assert_eq!(sink.jacobian(LimbId::new(0)).unwrap().norm(), 0.0);
    }

    #[test]
    fn test_joint_vertices_are_skipped() {
        let model = FloorContactForce::new(flat_params()).unwrap();
        let mut robot = robot_with(
            &[
                Vector3::new(0.0, 0.0, height_for_gap(0.001)),
                Vector3::new(0.1, 0.0, height_for_gap(-0.001)),
            ],
            0.0,
        );
        robot
            .limb_mut(LimbId::new(0))
            .unwrap()
            .mark_joint_vertex(1)
            .unwrap();

        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = model.compute_force(&robot, 1e-3, &mut sink).unwrap();

        assert_eq!(report.num_contacts, 1);
        // The penetrating joint vertex is not even seen by min_dist.
        assert_relative_eq!(report.min_dist, 0.001, epsilon = 1e-9);
        let force = sink.force(LimbId::new(0)).unwrap();
        assert!(force[2] > 0.0);
        assert_eq!(force[6], 0.0);
    }

    #[test]
    fn test_diagnostics_are_per_call() {
        let model = FloorContactForce::new(flat_params()).unwrap();
        let robot = robot_with(&[Vector3::new(0.0, 0.0, height_for_gap(0.004))], 0.0);
        let mut sink = DenseAccumulator::for_robot(&robot);

        let first = model.compute_force(&robot, 1e-3, &mut sink).unwrap();
        let second = model.compute_force(&robot, 1e-3, &mut sink).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.num_contacts, 1);
    }

    #[test]
    fn test_empty_robot_reports_sentinel() {
        let model = FloorContactForce::new(flat_params()).unwrap();
        let robot = SoftRobot::new();
        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = model.compute_force(&robot, 1e-3, &mut sink).unwrap();
        assert_eq!(report, ContactDiagnostics::default());
        assert!(!report.has_contacts());
        assert!(!report.is_penetrating());
    }

    #[test]
    fn test_deep_penetration_diverges() {
        // exp(15/1e-4 · 1.0) overflows.
        let params = FloorContactParams::flat_floor(1e-4, 0.01, 0.0);
        let model = FloorContactForce::new(params).unwrap();
        let robot = robot_with(&[Vector3::new(0.0, 0.0, -1.0)], 0.0);
        let mut sink = DenseAccumulator::for_robot(&robot);
        let err = model.compute_force(&robot, 1e-3, &mut sink).unwrap_err();
        assert!(err.is_diverged());
    }

    #[test]
    fn test_deep_penetration_jacobian_is_finite() {
        let params = FloorContactParams::flat_floor(0.01, 0.01, 0.0).with_floor_mu(0.5);
        let model = FloorContactForce::new(params).unwrap();
        let mut robot = robot_with(&[Vector3::new(0.0, 0.0, -0.3)], 0.0);
        robot
            .limb_mut(LimbId::new(0))
            .unwrap()
            .set_vertex(0, Vector3::new(0.02, 0.0, -0.3))
            .unwrap();

        let mut sink = DenseAccumulator::for_robot(&robot);
        let report = model
            .compute_force_and_jacobian(&robot, 1e-3, &mut sink)
            .unwrap();

        assert!(report.is_penetrating());
        assert!(sink.is_finite());
        let jacobian = sink.jacobian(LimbId::new(0)).unwrap();
        assert_relative_eq!(
            jacobian[(2, 2)],
            -2.0 * params.contact_stiffness,
            max_relative = 1e-9
        );
        assert!(jacobian[(0, 2)] != 0.0);
    }

    #[test]
    fn test_diverged_call_reports_in_jacobian_mode() {
        let params = FloorContactParams::flat_floor(1e-4, 0.01, 0.0);
        let model = FloorContactForce::new(params).unwrap();
        let robot = robot_with(&[Vector3::new(0.0, 0.0, -1.0)], 0.0);
        let mut sink = DenseAccumulator::for_robot(&robot);
        let err = model
            .compute_force_and_jacobian(&robot, 1e-3, &mut sink)
            .unwrap_err();
        assert!(err.is_diverged());
    }

    #[test]
    fn test_contact_jacobian_is_diagonal() {
        let model = FloorContactForce::new(flat_params()).unwrap();
        let robot = robot_with(&[Vector3::new(0.0, 0.0, height_for_gap(0.003))], 0.0);
        let mut sink = DenseAccumulator::for_robot(&robot);
        model
            .compute_force_and_jacobian(&robot, 1e-3, &mut sink)
            .unwrap();

        let jacobian = sink.jacobian(LimbId::new(0)).unwrap();
        let expected = model.normal_law().evaluate(0.003).d_magnitude_d_gap;
        assert_relative_eq!(jacobian[(2, 2)], expected, max_relative = 1e-6);
        for row in 0..3 {
            for col in 0..3 {
                if row != col {
                    assert_eq!(jacobian[(row, col)], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_static_friction_skips_jacobian() {
        let model = FloorContactForce::new(flat_params().with_floor_mu(0.5)).unwrap();
        let robot = robot_with(&[Vector3::new(0.2, 0.0, height_for_gap(0.003))], 0.0);
        let mut sink = DenseAccumulator::for_robot(&robot);
        model
            .compute_force_and_jacobian(&robot, 1e-3, &mut sink)
            .unwrap();

        let force = sink.force(LimbId::new(0)).unwrap();
        let jacobian = sink.jacobian(LimbId::new(0)).unwrap();
        assert_eq!(force[0], 0.0);
        assert_eq!(force[1], 0.0);
        assert_eq!(jacobian[(0, 1)], 0.0);
        assert_eq!(jacobian[(0, 2)], 0.0);
        assert_eq!(jacobian[(1, 2)], 0.0);
    }
}
