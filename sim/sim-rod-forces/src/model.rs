//! The force model contract shared by every rod force.
//!
//! An implicit (Newton / implicit-Euler) stepper evaluates each active force
//! model once per Newton iteration. A model reads the robot's current and
//! start-of-step DOFs, evaluates its local law at every vertex, and pushes
//! additive contributions into the stepper's [`ForceAccumulator`].
//!
//! Models hold only immutable parameters. Nothing carries over from one
//! call to the next, so the same model can be evaluated any number of times
//! per step and in any order relative to other models.

use sim_rod::{ForceAccumulator, Result, SoftRobot};

/// A generalized force acting on the DOFs of a [`SoftRobot`].
///
/// # Contract
///
/// - [`compute_force`](Self::compute_force) writes force contributions only.
/// - [`compute_force_and_jacobian`](Self::compute_force_and_jacobian) writes
///   forces **and** Jacobian entries. The forces it writes are identical to
///   those `compute_force` writes for the same input.
/// - Both return `SimError::InvalidTimestep` for a non-positive or
///   non-finite `dt` before touching the sink.
/// - Call-scoped diagnostics are returned as [`Self::Report`], never stored.
pub trait ForceModel {
    /// Per-call diagnostics produced alongside the contributions.
    type Report;

    /// Accumulate this model's forces for timestep `dt`.
    fn compute_force(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
    ) -> Result<Self::Report>;

    /// Accumulate this model's forces and their Jacobian for timestep `dt`.
    fn compute_force_and_jacobian(
        &self,
        robot: &SoftRobot,
        dt: f64,
        sink: &mut dyn ForceAccumulator,
    ) -> Result<Self::Report>;
}

/// Which outputs a traversal produces.
///
/// Concrete models run one traversal for both entry points, so forces are
/// computed by the same code whether or not the Jacobian is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Forces only.
    Force,
    /// Forces and Jacobian entries.
    ForceAndJacobian,
}

impl EvaluationMode {
    /// Whether Jacobian entries should be produced.
    #[must_use]
    pub const fn wants_jacobian(self) -> bool {
        matches!(self, Self::ForceAndJacobian)
    }
}
