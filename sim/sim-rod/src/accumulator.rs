//! Force and Jacobian accumulation sinks.
//!
//! Force models never own the global system. They push additive
//! contributions into a [`ForceAccumulator`] supplied by the time stepper,
//! one limb block at a time.
//!
//! Sign convention: values are **physical** forces, and Jacobian entries are
//! `∂force[row] / ∂x[col]` within one limb. A Newton stepper assembling the
//! residual `M·a − F` negates both on its side.

use nalgebra::{DMatrix, DVector};

use crate::dof::{DofIndex, LimbId, LocalDof};
use crate::robot::SoftRobot;
use crate::{Result, SimError};

/// Additive sink for generalized forces and their Jacobian.
pub trait ForceAccumulator {
    /// Add `value` to the force acting on `dof`.
    fn add_force(&mut self, dof: DofIndex, value: f64);

    /// Add `value` to the Jacobian entry `∂force[row] / ∂x[col]` of `limb`.
    fn add_jacobian(&mut self, limb: LimbId, row: LocalDof, col: LocalDof, value: f64);
}

/// Dense per-limb force vectors and Jacobian blocks.
///
/// Reference sink for tests, tools and small assemblies. A production
/// stepper maps these limb-local blocks into its global sparse system.
///
/// # Example
///
/// ```
/// use sim_rod::{DenseAccumulator, DofIndex, ForceAccumulator, LimbId, RodLimb, SoftRobot};
/// use nalgebra::Vector3;
///
/// let mut robot = SoftRobot::new();
/// let limb = robot.add_limb(RodLimb::new(&[Vector3::zeros()], 0.01, 0.0).unwrap());
///
/// let mut sink = DenseAccumulator::for_robot(&robot);
/// sink.add_force(DofIndex::translational(limb, 0, 2), 1.5);
/// sink.add_force(DofIndex::translational(limb, 0, 2), 0.5);
///
/// assert_eq!(sink.force(limb).unwrap()[2], 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DenseAccumulator {
    forces: Vec<DVector<f64>>,
    jacobians: Vec<DMatrix<f64>>,
}

impl DenseAccumulator {
    /// Allocate zeroed blocks sized for every limb of `robot`.
    #[must_use]
    pub fn for_robot(robot: &SoftRobot) -> Self {
        let sizes: Vec<usize> = robot.limbs().map(|(_, limb)| limb.num_dofs()).collect();
        Self::with_sizes(&sizes)
    }

    /// Allocate zeroed blocks with explicit per-limb DOF counts.
    #[must_use]
    pub fn with_sizes(dofs_per_limb: &[usize]) -> Self {
        Self {
            forces: dofs_per_limb.iter().map(|&n| DVector::zeros(n)).collect(),
            jacobians: dofs_per_limb.iter().map(|&n| DMatrix::zeros(n, n)).collect(),
        }
    }

    /// Number of limb blocks.
    #[must_use]
    pub fn num_limbs(&self) -> usize {
        self.forces.len()
    }

    /// Accumulated force vector of `limb`.
    pub fn force(&self, limb: LimbId) -> Result<&DVector<f64>> {
        self.forces
            .get(limb.raw())
            .ok_or(SimError::LimbNotFound(limb.raw()))
    }

    /// Accumulated Jacobian block of `limb`.
    pub fn jacobian(&self, limb: LimbId) -> Result<&DMatrix<f64>> {
        self.jacobians
            .get(limb.raw())
            .ok_or(SimError::LimbNotFound(limb.raw()))
    }

    /// Zero every block, keeping allocations.
    pub fn clear(&mut self) {
        for force in &mut self.forces {
            force.fill(0.0);
        }
        for jacobian in &mut self.jacobians {
            jacobian.fill(0.0);
        }
    }

    /// Whether every accumulated value is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.forces.iter().all(|f| f.iter().all(|v| v.is_finite()))
            && self
                .jacobians
                .iter()
                .all(|j| j.iter().all(|v| v.is_finite()))
    }
}

impl ForceAccumulator for DenseAccumulator {
    fn add_force(&mut self, dof: DofIndex, value: f64) {
        self.forces[dof.limb.raw()][dof.local.raw()] += value;
    }

    fn add_jacobian(&mut self, limb: LimbId, row: LocalDof, col: LocalDof, value: f64) {
        self.jacobians[limb.raw()][(row.raw(), col.raw())] += value;
    }
}
