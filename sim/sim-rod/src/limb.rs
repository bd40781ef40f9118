//! Discrete elastic rod limbs.
//!
//! A [`RodLimb`] stores the DOF vector of one rod at the current Newton
//! iterate (`x`) and at the start of the timestep (`x0`), along with the
//! per-limb material data force models need: rod radius, friction
//! coefficient and joint-ownership flags.

use nalgebra::{DVector, Vector3};

use crate::dof::{limb_dof_count, LocalDof, DOFS_PER_VERTEX, TRANSLATIONAL_DOFS};
use crate::{Result, SimError};

/// One rod of a soft robot.
///
/// # Example
///
/// ```
/// use sim_rod::RodLimb;
/// use nalgebra::Vector3;
///
/// let limb = RodLimb::new(
///     &[Vector3::new(0.0, 0.0, 0.1), Vector3::new(0.1, 0.0, 0.1)],
///     0.005,
///     0.4,
/// )
/// .unwrap();
///
/// assert_eq!(limb.num_vertices(), 2);
/// assert_eq!(limb.num_dofs(), 7);
/// assert_eq!(limb.vertex(1), Vector3::new(0.1, 0.0, 0.1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RodLimb {
    /// DOFs at the current iterate.
    x: DVector<f64>,
    /// DOFs at the start of the timestep.
    x0: DVector<f64>,
    /// Per-DOF joint ownership.
    is_dof_joint: Vec<bool>,
    /// Cross-section radius (m).
    rod_radius: f64,
    /// Coulomb friction coefficient of the rod surface.
    mu: f64,
}

impl RodLimb {
    /// Build a limb at rest from its node positions.
    ///
    /// Twist DOFs start at zero and the previous-timestep state equals the
    /// current one.
    pub fn new(nodes: &[Vector3<f64>], rod_radius: f64, mu: f64) -> Result<Self> {
        if nodes.is_empty() {
            return Err(SimError::invalid_limb("a limb needs at least one node"));
        }
        if !rod_radius.is_finite() || rod_radius <= 0.0 {
            return Err(SimError::invalid_limb(format!(
                "rod radius must be positive and finite, got {rod_radius}"
            )));
        }
        if !mu.is_finite() || mu < 0.0 {
            return Err(SimError::invalid_limb(format!(
                "friction coefficient must be non-negative and finite, got {mu}"
            )));
        }

        let num_dofs = limb_dof_count(nodes.len());
        let mut x = DVector::zeros(num_dofs);
        for (i, node) in nodes.iter().enumerate() {
            for axis in 0..TRANSLATIONAL_DOFS {
                x[DOFS_PER_VERTEX * i + axis] = node[axis];
            }
        }

        Ok(Self {
            x0: x.clone(),
            x,
            is_dof_joint: vec![false; num_dofs],
            rod_radius,
            mu,
        })
    }

    /// Number of nodes.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        (self.x.len() + 1) / DOFS_PER_VERTEX
    }

    /// Number of DOFs (`4 * nv - 1`).
    #[must_use]
    pub fn num_dofs(&self) -> usize {
        self.x.len()
    }

    /// Cross-section radius.
    #[must_use]
    pub fn rod_radius(&self) -> f64 {
        self.rod_radius
    }

    /// Friction coefficient of the rod surface.
    #[must_use]
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Current DOF vector.
    #[must_use]
    pub fn dofs(&self) -> &DVector<f64> {
        &self.x
    }

    /// Previous-timestep DOF vector.
    #[must_use]
    pub fn pre_dofs(&self) -> &DVector<f64> {
        &self.x0
    }

    /// Current value of a single DOF.
    #[must_use]
    pub fn dof(&self, dof: LocalDof) -> f64 {
        self.x[dof.raw()]
    }

    /// Previous-timestep value of a single DOF.
    #[must_use]
    pub fn pre_dof(&self, dof: LocalDof) -> f64 {
        self.x0[dof.raw()]
    }

    /// Current position of node `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_vertices()`.
    #[must_use]
    pub fn vertex(&self, i: usize) -> Vector3<f64> {
        Self::read_vertex(&self.x, i)
    }

    /// Position of node `i` at the start of the timestep.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_vertices()`.
    #[must_use]
    pub fn pre_vertex(&self, i: usize) -> Vector3<f64> {
        Self::read_vertex(&self.x0, i)
    }

    /// Backward-difference velocity of node `i` over `dt`.
    #[must_use]
    pub fn velocity(&self, i: usize, dt: f64) -> Vector3<f64> {
        (self.vertex(i) - self.pre_vertex(i)) / dt
    }

    /// Overwrite the current position of node `i`.
    pub fn set_vertex(&mut self, i: usize, position: Vector3<f64>) -> Result<()> {
        self.check_vertex(i)?;
        Self::write_vertex(&mut self.x, i, &position);
        Ok(())
    }

    /// Overwrite the previous-timestep position of node `i`.
    pub fn set_pre_vertex(&mut self, i: usize, position: Vector3<f64>) -> Result<()> {
        self.check_vertex(i)?;
        Self::write_vertex(&mut self.x0, i, &position);
        Ok(())
    }

    /// Overwrite a single current DOF (translational or twist).
    pub fn set_dof(&mut self, dof: LocalDof, value: f64) -> Result<()> {
        self.check_vertex(dof.vertex())?;
        match self.x.get_mut(dof.raw()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(SimError::VertexOutOfRange {
                vertex: dof.vertex(),
                num_vertices: self.num_vertices(),
            }),
        }
    }

    /// Flag the translational DOFs of node `i` as owned by a joint.
    ///
    /// Force models that do not support articulated joints skip such nodes.
    pub fn mark_joint_vertex(&mut self, i: usize) -> Result<()> {
        self.check_vertex(i)?;
        for axis in 0..TRANSLATIONAL_DOFS {
            self.is_dof_joint[LocalDof::translational(i, axis).raw()] = true;
        }
        Ok(())
    }

    /// Whether a DOF is owned by a joint.
    #[must_use]
    pub fn is_dof_joint(&self, dof: LocalDof) -> bool {
        self.is_dof_joint.get(dof.raw()).copied().unwrap_or(false)
    }

    /// Whether node `i` is owned by a joint (judged by its z DOF).
    #[must_use]
    pub fn is_joint_vertex(&self, i: usize) -> bool {
        self.is_dof_joint(LocalDof::translational(i, 2))
    }

    /// Accept the current iterate as the new start-of-step state.
    pub fn commit_step(&mut self) {
        self.x0.copy_from(&self.x);
    }

    fn check_vertex(&self, i: usize) -> Result<()> {
        if i < self.num_vertices() {
            Ok(())
        } else {
            Err(SimError::VertexOutOfRange {
                vertex: i,
                num_vertices: self.num_vertices(),
            })
        }
    }

    fn read_vertex(dofs: &DVector<f64>, i: usize) -> Vector3<f64> {
        let base = DOFS_PER_VERTEX * i;
        Vector3::new(dofs[base], dofs[base + 1], dofs[base + 2])
    }

    fn write_vertex(dofs: &mut DVector<f64>, i: usize, position: &Vector3<f64>) {
        let base = DOFS_PER_VERTEX * i;
        for axis in 0..TRANSLATIONAL_DOFS {
            dofs[base + axis] = position[axis];
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn three_node_limb() -> RodLimb {
        RodLimb::new(
            &[
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.1, 0.0, 0.0),
                Vector3::new(0.2, 0.0, 0.0),
            ],
            0.01,
            0.3,
        )
        .unwrap()
    }

    #[test]
    fn test_layout() {
        let limb = three_node_limb();
        assert_eq!(limb.num_vertices(), 3);
        assert_eq!(limb.num_dofs(), 11);
        assert_eq!(limb.dof(LocalDof::translational(2, 0)), 0.2);
        assert_eq!(limb.dof(LocalDof::twist(0)), 0.0);
        assert_eq!(limb.vertex(1), limb.pre_vertex(1));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(RodLimb::new(&[], 0.01, 0.0).is_err());
        assert!(RodLimb::new(&[Vector3::zeros()], 0.0, 0.0).is_err());
        assert!(RodLimb::new(&[Vector3::zeros()], 0.01, -0.1).is_err());
        assert!(RodLimb::new(&[Vector3::zeros()], f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_velocity_and_commit() {
        let mut limb = three_node_limb();
        limb.set_vertex(1, Vector3::new(0.1, 0.02, 0.0)).unwrap();

        let vel = limb.velocity(1, 0.01);
        assert_relative_eq!(vel, Vector3::new(0.0, 2.0, 0.0), epsilon = 1e-12);

        limb.commit_step();
        assert_eq!(limb.pre_vertex(1), limb.vertex(1));
        assert_relative_eq!(limb.velocity(1, 0.01).norm(), 0.0);
    }

    #[test]
    fn test_out_of_range() {
        let mut limb = three_node_limb();
        let err = limb.set_vertex(3, Vector3::zeros()).unwrap_err();
        assert_eq!(
            err,
            SimError::VertexOutOfRange {
                vertex: 3,
                num_vertices: 3
            }
        );
        assert!(limb.mark_joint_vertex(5).is_err());
        assert!(limb.set_dof(LocalDof::twist(2), 1.0).is_err());
    }

    #[test]
    fn test_joint_flags() {
        let mut limb = three_node_limb();
        assert!(!limb.is_joint_vertex(2));
        limb.mark_joint_vertex(2).unwrap();
        assert!(limb.is_joint_vertex(2));
        assert!(limb.is_dof_joint(LocalDof::translational(2, 0)));
        assert!(!limb.is_joint_vertex(1));
    }
}
