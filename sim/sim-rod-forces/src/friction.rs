//! Regularized Coulomb friction against the floor.
//!
//! Coulomb friction is set-valued at zero slip: any force inside the cone is
//! admissible. For a Newton solver the law is regularized on the in-plane
//! slip speed `s`:
//!
//! ```text
//! s == 0              Static        fr = 0
//! s >  slip_tol       Sliding       fr = −μ·fn·u              (γ = 1)
//! otherwise           Transitional  fr = −γ(s)·μ·fn·u,  γ(s) = 2/(1 + e^(−K2·s)) − 1
//! ```
//!
//! `γ` rises smoothly from 0 at rest to ≈1 at the slip tolerance
//! (`γ(slip_tol) = 2/(1 + e⁻¹⁵) − 1`).
//!
//! Friction acts in the x-y plane only, which is the tangent plane of a
//! floor whose normal is +z.

use nalgebra::Vector2;

use crate::partials::{FrictionJacobianInput, FrictionPartials, FrictionPartialsBackend};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Active branch of the regularized friction law.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrictionRegime {
    /// No relative motion: zero friction, no Jacobian.
    Static,
    /// Fully developed Coulomb sliding.
    Sliding,
    /// Smooth bridge between rest and sliding.
    Transitional {
        /// Friction scale `γ ∈ (0, 1)`.
        gamma: f64,
    },
}

impl FrictionRegime {
    /// Classify an in-plane slip speed.
    #[must_use]
    pub fn classify(speed: f64, slip_tolerance: f64, k2: f64) -> Self {
        if speed == 0.0 {
            Self::Static
        } else if speed > slip_tolerance {
            Self::Sliding
        } else {
            Self::Transitional {
                gamma: 2.0 / (1.0 + (-k2 * speed).exp()) - 1.0,
            }
        }
    }

    /// Friction scale `γ` of this regime.
    #[must_use]
    pub fn gamma(self) -> f64 {
        match self {
            Self::Static => 0.0,
            Self::Sliding => 1.0,
            Self::Transitional { gamma } => gamma,
        }
    }

    /// Friction partials from the evaluator matching this regime.
    ///
    /// `None` in the static regime: the law has a non-differentiable corner
    /// at zero slip and no Jacobian is contributed there.
    pub fn partials<B>(self, backend: &B, input: &FrictionJacobianInput) -> Option<FrictionPartials>
    where
        B: FrictionPartialsBackend + ?Sized,
    {
        match self {
            Self::Static => None,
            Self::Sliding => Some(backend.sliding(input)),
            Self::Transitional { .. } => Some(backend.transitional(input)),
        }
    }
}

/// Result of evaluating friction at one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionState {
    /// Active regime.
    pub regime: FrictionRegime,
    /// In-plane friction force.
    pub force: Vector2<f64>,
}

impl FrictionState {
    /// The static state: no force.
    #[must_use]
    pub fn at_rest() -> Self {
        Self {
            regime: FrictionRegime::Static,
            force: Vector2::zeros(),
        }
    }
}

/// Regularized floor friction with fixed slip tolerance.
///
/// # Example
///
/// ```
/// use sim_rod_forces::{FrictionRegime, RegularizedFloorFriction};
/// use nalgebra::Vector2;
///
/// let friction = RegularizedFloorFriction::new(1e-3);
///
/// // 2 mm in 0.1 s = 0.02 m/s, well past the 1 mm/s slip tolerance.
/// let state = friction.evaluate(&Vector2::new(0.002, 0.0), &Vector2::zeros(), 10.0, 0.5, 0.1);
/// assert_eq!(state.regime, FrictionRegime::Sliding);
/// assert!((state.force.x + 5.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegularizedFloorFriction {
    /// Slip speed above which friction is fully developed (m/s).
    pub slip_tolerance: f64,
    /// Sharpness `K2 = 15 / slip_tolerance`.
    pub k2: f64,
}

impl RegularizedFloorFriction {
    /// Create the friction law for a slip tolerance.
    #[must_use]
    pub fn new(slip_tolerance: f64) -> Self {
        Self {
            slip_tolerance,
            k2: crate::params::SHARPNESS / slip_tolerance,
        }
    }

    /// Classify the in-plane slip speed.
    #[must_use]
    pub fn regime(&self, speed: f64) -> FrictionRegime {
        FrictionRegime::classify(speed, self.slip_tolerance, self.k2)
    }

    /// Friction force on a vertex moving from `prev` to `curr` in `dt`.
    #[must_use]
    pub fn evaluate(
        &self,
        curr: &Vector2<f64>,
        prev: &Vector2<f64>,
        normal_force: f64,
        mu: f64,
        dt: f64,
    ) -> FrictionState {
        let velocity = (curr - prev) / dt;
        let speed = velocity.norm();
        let regime = self.regime(speed);

        match regime {
            FrictionRegime::Static => FrictionState::at_rest(),
            FrictionRegime::Sliding | FrictionRegime::Transitional { .. } => FrictionState {
                regime,
                force: velocity * (-regime.gamma() * mu * normal_force / speed),
            },
        }
    }

    /// Assemble the backend input for a vertex.
    #[must_use]
    pub fn jacobian_input(
        &self,
        curr: &Vector2<f64>,
        prev: &Vector2<f64>,
        normal_force: f64,
        mu: f64,
        dt: f64,
    ) -> FrictionJacobianInput {
        FrictionJacobianInput {
            curr: *curr,
            prev: *prev,
            normal_force,
            mu,
            dt,
            k2: self.k2,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::panic,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::partials::ClosedFormPartials;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_velocity_is_static() {
        let friction = RegularizedFloorFriction::new(1e-3);
        let p = Vector2::new(0.25, -0.5);
        let state = friction.evaluate(&p, &p, 10.0, 0.8, 1e-3);
        assert_eq!(state.regime, FrictionRegime::Static);
        assert_eq!(state.force, Vector2::zeros());
        assert!(state.force.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_sliding_is_full_coulomb() {
        let friction = RegularizedFloorFriction::new(0.01);
        // speed = 0.02 = 2 × slip tolerance
        let state = friction.evaluate(
            &Vector2::new(0.0012, 0.0016),
            &Vector2::zeros(),
            3.0,
            0.4,
            0.1,
        );
        assert_eq!(state.regime, FrictionRegime::Sliding);
        assert_relative_eq!(state.force.norm(), 0.4 * 3.0, epsilon = 1e-12);
        assert_relative_eq!(
            state.force.normalize(),
            -Vector2::new(0.6, 0.8),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_transitional_is_partial() {
        let friction = RegularizedFloorFriction::new(0.01);
        let state = friction.evaluate(
            &Vector2::new(0.0001, 0.0),
            &Vector2::zeros(),
            3.0,
            0.4,
            0.1,
        );
        let FrictionRegime::Transitional { gamma } = state.regime else {
            panic!("expected transitional regime, got {:?}", state.regime);
        };
        assert!(gamma > 0.0 && gamma < 1.0);
        assert_relative_eq!(state.force.x, -gamma * 0.4 * 3.0, epsilon = 1e-12);
        assert_eq!(state.force.y, 0.0);
    }

    #[test]
    fn test_gamma_continuous_at_slip_tolerance() {
        let slip = 0.01;
        let friction = RegularizedFloorFriction::new(slip);
        let below = friction.regime(slip * (1.0 - 1e-9)).gamma();
        let above = friction.regime(slip * (1.0 + 1e-9)).gamma();
        assert_eq!(above, 1.0);
        assert_relative_eq!(below, 1.0, epsilon = 1e-6);

        let mut last = 0.0;
        for i in 1..=50 {
            let gamma = friction.regime(slip * f64::from(i) / 50.0).gamma();
            assert!(gamma > last);
            last = gamma;
        }
    }

    #[test]
    fn test_partials_dispatch() {
        let backend = ClosedFormPartials;
        let friction = RegularizedFloorFriction::new(1e-3);
        let input = friction.jacobian_input(
            &Vector2::new(0.01, 0.0),
            &Vector2::zeros(),
            2.0,
            0.5,
            0.1,
        );

        assert!(FrictionRegime::Static.partials(&backend, &input).is_none());
        assert_eq!(
            FrictionRegime::Sliding.partials(&backend, &input),
            Some(backend.sliding(&input))
        );
        assert_eq!(
            FrictionRegime::Transitional { gamma: 0.5 }.partials(&backend, &input),
            Some(backend.transitional(&input))
        );
    }
}
