//! Parameters for the floor contact and damping models.
//!
//! Parameters are plain data: build them with the constructors and `with_*`
//! methods, check them with `validate()`, and hand them to the model. They
//! never change once a model has been constructed.

use nalgebra::Vector3;
use sim_rod::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sharpness of the smooth surrogates: `K1 = 15/δ`, `K2 = 15/slip_tol`.
pub const SHARPNESS: f64 = 15.0;

/// Contact stiffness scale applied to the smoothed normal force law.
pub const DEFAULT_CONTACT_STIFFNESS: f64 = 1e4;

/// Cylinder radius used when none is given.
pub const DEFAULT_CYLINDER_RADIUS: f64 = 10.0;

/// Cylinder radius used by [`FloorContactParams::flat_floor`].
///
/// Across a 1 m wide patch the surface drops by `0.25 / (2R)` ≈ 1.25e-5 m.
pub const FLAT_FLOOR_RADIUS: f64 = 1e4;

/// Parameters of [`FloorContactForce`](crate::FloorContactForce).
///
/// The contact surface is an infinite cylinder of radius `cylinder_radius`
/// around `cylinder_axis`. The axis passes through `(0, 0, floor_z − R)`,
/// so for a horizontal axis the top of the surface sits at height
/// `floor_z`; a large radius makes that patch an effectively flat floor.
///
/// # Example
///
/// ```
/// use sim_rod_forces::FloorContactParams;
///
/// let params = FloorContactParams::flat_floor(1e-3, 1e-3, 0.0).with_floor_mu(0.6);
/// assert!(params.validate().is_ok());
/// assert!((params.k1() - 15_000.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FloorContactParams {
    /// Contact smoothing width δ (m).
    ///
    /// Vertices farther than δ from the surface feel no force.
    pub delta: f64,

    /// Slip velocity tolerance (m/s).
    ///
    /// Above it friction is fully developed Coulomb sliding; below it a
    /// smooth bridge ramps friction from zero.
    pub slip_tolerance: f64,

    /// Height of the top of the contact surface (m).
    pub floor_z: f64,

    /// Floor friction coefficient.
    ///
    /// The effective coefficient at a vertex is `max(floor_mu, limb.mu)`.
    pub floor_mu: f64,

    /// Cylinder radius (m). Very large ⇒ effectively flat floor.
    pub cylinder_radius: f64,

    /// Direction of the cylinder axis. Normalized by the model.
    pub cylinder_axis: Vector3<f64>,

    /// Stiffness scale of the smoothed normal force.
    pub contact_stiffness: f64,
}

impl Default for FloorContactParams {
    fn default() -> Self {
        Self::new(1e-3, 1e-3, 0.0)
    }
}

impl FloorContactParams {
    /// Create parameters with the default cylinder (radius 10, axis +z),
    /// no floor friction and the default stiffness.
    #[must_use]
    pub fn new(delta: f64, slip_tolerance: f64, floor_z: f64) -> Self {
        Self {
            delta,
            slip_tolerance,
            floor_z,
            floor_mu: 0.0,
            cylinder_radius: DEFAULT_CYLINDER_RADIUS,
            cylinder_axis: Vector3::z(),
            contact_stiffness: DEFAULT_CONTACT_STIFFNESS,
        }
    }

    /// Effectively flat floor at height `floor_z`: a cylinder of radius
    /// [`FLAT_FLOOR_RADIUS`] around the x axis.
    #[must_use]
    pub fn flat_floor(delta: f64, slip_tolerance: f64, floor_z: f64) -> Self {
        Self::new(delta, slip_tolerance, floor_z).with_cylinder(FLAT_FLOOR_RADIUS, Vector3::x())
    }

    /// Set the floor friction coefficient.
    #[must_use]
    pub fn with_floor_mu(mut self, mu: f64) -> Self {
        self.floor_mu = mu;
        self
    }

    /// Set the cylinder radius and axis.
    #[must_use]
    pub fn with_cylinder(mut self, radius: f64, axis: Vector3<f64>) -> Self {
        self.cylinder_radius = radius;
        self.cylinder_axis = axis;
        self
    }

    /// Set the contact stiffness scale.
    #[must_use]
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.contact_stiffness = stiffness;
        self
    }

    /// Contact sharpness `K1 = 15/δ`.
    #[must_use]
    pub fn k1(&self) -> f64 {
        SHARPNESS / self.delta
    }

    /// Friction sharpness `K2 = 15/slip_tolerance`.
    #[must_use]
    pub fn k2(&self) -> f64 {
        SHARPNESS / self.slip_tolerance
    }

    /// Validate the parameters are physically reasonable.
    pub fn validate(&self) -> Result<()> {
        positive("delta", self.delta)?;
        positive("slip_tolerance", self.slip_tolerance)?;
        positive("cylinder_radius", self.cylinder_radius)?;
        positive("contact_stiffness", self.contact_stiffness)?;
        if !self.floor_z.is_finite() {
            return Err(SimError::invalid_config("floor_z must be finite"));
        }
        if !self.floor_mu.is_finite() || self.floor_mu < 0.0 {
            return Err(SimError::invalid_config(
                "floor_mu must be non-negative and finite",
            ));
        }
        let axis_norm = self.cylinder_axis.norm();
        if !axis_norm.is_finite() || axis_norm < 1e-12 {
            return Err(SimError::invalid_config(
                "cylinder_axis must be a non-zero finite vector",
            ));
        }
        Ok(())
    }
}

/// Parameters of [`DampingForce`](crate::DampingForce).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DampingParams {
    /// Linear viscosity (N·s/m), applied per free vertex.
    pub viscosity: f64,
}

impl Default for DampingParams {
    fn default() -> Self {
        Self { viscosity: 0.01 }
    }
}

impl DampingParams {
    /// Create damping parameters with the given viscosity.
    #[must_use]
    pub fn new(viscosity: f64) -> Self {
        Self { viscosity }
    }

    /// Validate the parameters are physically reasonable.
    pub fn validate(&self) -> Result<()> {
        if !self.viscosity.is_finite() || self.viscosity < 0.0 {
            return Err(SimError::invalid_config(format!(
                "viscosity must be non-negative and finite, got {}",
                self.viscosity
            )));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_config(format!(
            "{name} must be positive and finite, got {value}"
        )))
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

    #[test]
    fn test_default_params_valid() {
        assert!(FloorContactParams::default().validate().is_ok());
        assert!(DampingParams::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_match_constructor() {
        let params = FloorContactParams::new(0.01, 0.02, 0.5);
        assert_eq!(params.floor_mu, 0.0);
        assert_eq!(params.cylinder_radius, 10.0);
        assert_eq!(params.cylinder_axis, Vector3::z());
        assert_eq!(params.contact_stiffness, 1e4);
    }

    #[test]
    fn test_derived_rates() {
        let params = FloorContactParams::new(0.01, 0.005, 0.0);
        assert_relative_eq!(params.k1(), 1500.0, epsilon = 1e-9);
        assert_relative_eq!(params.k2(), 3000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_floor_preset() {
        let params = FloorContactParams::flat_floor(1e-3, 1e-3, 0.2);
        assert!(params.validate().is_ok());
        assert_eq!(params.cylinder_radius, FLAT_FLOOR_RADIUS);
        assert_eq!(params.cylinder_axis, Vector3::x());
        assert_eq!(params.floor_z, 0.2);
    }

    #[test]
    fn test_invalid_params() {
        assert!(FloorContactParams::new(0.0, 1e-3, 0.0).validate().is_err());
        assert!(FloorContactParams::new(1e-3, 0.0, 0.0).validate().is_err());
        assert!(FloorContactParams::new(1e-3, 1e-3, f64::NAN)
            .validate()
            .is_err());
        assert!(FloorContactParams::default()
            .with_floor_mu(-0.1)
            .validate()
            .is_err());
        assert!(FloorContactParams::default()
            .with_cylinder(10.0, Vector3::zeros())
            .validate()
            .is_err());
        assert!(FloorContactParams::default()
            .with_stiffness(-1.0)
            .validate()
            .unwrap_err()
            .is_config_error());
        assert!(DampingParams::new(-1.0).validate().is_err());
    }
}
