//! Contact, friction and damping forces for implicit discrete-elastic-rod
//! integrators.
//!
//! Each model in this crate is evaluated once per Newton iteration. It reads
//! the current and start-of-step DOFs of a [`SoftRobot`] and pushes additive
//! force and Jacobian contributions into a [`ForceAccumulator`]. All forces
//! are physical: positive along the axis they push.
//!
//! - [`FloorContactForce`]: smooth penalty contact against a cylindrical
//!   floor plus regularized Coulomb friction, with analytically exact
//!   partials.
//! - [`DampingForce`]: linear viscous drag on free vertices.
//!
//! # Contact Model
//!
//! Hard contact and Coulomb friction are both non-smooth, which stalls
//! Newton. Both are regularized:
//!
//! ```text
//! v        = exp(−K1 · gap),                 K1 = 15 / δ
//! fn       = k · 2v · ln(1 + v) / (K1 (1 + v))
//! γ(s)     = 2 / (1 + exp(−K2 · s)) − 1,     K2 = 15 / slip_tolerance
//! fr       = −γ · μ · fn · vel / |vel|
//! ```
//!
//! Vertices farther than δ from the surface contribute exactly nothing.
//!
//! # Example
//!
//! ```
//! use sim_rod::{DenseAccumulator, RodLimb, SoftRobot};
//! use sim_rod_forces::{
//!     DampingForce, DampingParams, FloorContactForce, FloorContactParams, ForceModel,
//! };
//! use nalgebra::Vector3;
//!
//! let contact = FloorContactForce::new(
//!     FloorContactParams::flat_floor(0.01, 0.01, 0.0).with_floor_mu(0.5),
//! )
//! .unwrap();
//! let damping = DampingForce::new(DampingParams::new(0.01)).unwrap();
//!
//! let nodes = [Vector3::new(0.0, 0.0, 0.006), Vector3::new(0.1, 0.0, 0.006)];
//! let mut robot = SoftRobot::new();
//! let limb = robot.add_limb(RodLimb::new(&nodes, 0.001, 0.0).unwrap());
//!
//! let mut sink = DenseAccumulator::for_robot(&robot);
//! let report = contact.compute_force_and_jacobian(&robot, 1e-3, &mut sink).unwrap();
//! damping.compute_force_and_jacobian(&robot, 1e-3, &mut sink).unwrap();
//!
//! assert_eq!(report.num_contacts, 2);
//! assert!(sink.force(limb).unwrap()[2] > 0.0);
//! assert!(sink.is_finite());
//! ```
//!
//! # Layer 0 Crate
//!
//! This crate has no engine or rendering dependencies. The stepper that owns
//! the global system, and whatever assembles the sink into it, live
//! elsewhere.

#![doc(html_root_url = "https://docs.rs/sim-rod-forces/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod damping;
mod floor;
mod friction;
mod model;
mod normal;
mod params;
mod partials;

pub use damping::DampingForce;
pub use floor::{ContactDiagnostics, FloorContactForce, SurfaceGap, MIN_DIST_SENTINEL};
pub use friction::{FrictionRegime, FrictionState, RegularizedFloorFriction};
pub use model::{EvaluationMode, ForceModel};
pub use normal::{NormalForce, SmoothNormalForce};
pub use params::{
    DampingParams, FloorContactParams, DEFAULT_CONTACT_STIFFNESS, DEFAULT_CYLINDER_RADIUS,
    FLAT_FLOOR_RADIUS, SHARPNESS,
};
pub use partials::{
    ClosedFormPartials, FrictionJacobianInput, FrictionPartials, FrictionPartialsBackend,
    FRICTION_INPUT_LEN,
};

// Re-export the types every caller needs to drive a model
pub use sim_rod::{
    DenseAccumulator, DofIndex, ForceAccumulator, LimbId, LocalDof, RodLimb, SimError, SoftRobot,
};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_models_are_send_sync() {
        assert_send_sync::<FloorContactForce>();
        assert_send_sync::<DampingForce>();
    }

    #[test]
    fn test_models_as_trait_objects() {
        let contact = FloorContactForce::new(FloorContactParams::flat_floor(0.01, 0.01, 0.0))
            .unwrap();
        let damping = DampingForce::new(DampingParams::default()).unwrap();

        let mut robot = SoftRobot::new();
        let limb = robot.add_limb(
            RodLimb::new(&[Vector3::new(0.0, 0.0, 0.004)], 0.001, 0.0).unwrap(),
        );
        robot
            .limb_mut(limb)
            .unwrap()
            .set_vertex(0, Vector3::new(0.0, 0.0, 0.003))
            .unwrap();

        let models: [&dyn ForceModel<Report = ()>; 1] = [&damping];
        let mut sink = DenseAccumulator::for_robot(&robot);
        for model in models {
            model.compute_force(&robot, 0.01, &mut sink).unwrap();
        }
        let damped = sink.force(limb).unwrap()[2];
        assert!(damped > 0.0);

        let report = contact.compute_force(&robot, 0.01, &mut sink).unwrap();
        assert_eq!(report.num_contacts, 1);
        assert!(sink.force(limb).unwrap()[2] > damped);
    }
}
