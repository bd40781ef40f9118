//! Core data types for discrete elastic rod simulation.
//!
//! This crate provides the containers every rod force model is written
//! against:
//!
//! - [`RodLimb`] - DOF vector of one rod (current and start-of-step), radius,
//!   friction coefficient, joint-ownership flags
//! - [`SoftRobot`] - Ordered assembly of limbs
//! - [`DofIndex`], [`LimbId`], [`LocalDof`] - Limb-scoped DOF addressing
//! - [`ForceAccumulator`] - Additive sink for forces and Jacobian entries
//! - [`DenseAccumulator`] - Dense per-limb reference sink
//!
//! # DOF Layout
//!
//! Node `i` of a limb owns local DOFs `4i`, `4i+1`, `4i+2` (x, y, z) and `4i+3`
//! (twist of the edge leaving it). Jacobian entries never couple two limbs.
//!
//! # Coordinates
//!
//! Right-handed, with +z up. Force models that assume a flat floor treat
//! x-y as the tangent plane.
//!
//! # Example
//!
//! ```
//! use sim_rod::{DenseAccumulator, RodLimb, SoftRobot};
//! use nalgebra::Vector3;
//!
//! let mut robot = SoftRobot::new();
//! let limb = robot.add_limb(
//!     RodLimb::new(&[Vector3::new(0.0, 0.0, 0.1), Vector3::new(0.1, 0.0, 0.1)], 0.005, 0.5)
//!         .unwrap(),
//! );
//!
//! let sink = DenseAccumulator::for_robot(&robot);
//! assert_eq!(sink.force(limb).unwrap().len(), 7);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-rod/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod accumulator;
mod dof;
mod error;
mod limb;
mod robot;

pub use accumulator::{DenseAccumulator, ForceAccumulator};
pub use dof::{
    limb_dof_count, DofIndex, LimbId, LocalDof, DOFS_PER_VERTEX, TRANSLATIONAL_DOFS,
};
pub use error::{validate_timestep, SimError};
pub use limb::RodLimb;
pub use robot::SoftRobot;

// Re-export math types for convenience
pub use nalgebra::{DMatrix, DVector, Matrix2, Vector2, Vector3};

/// Result type for rod simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
