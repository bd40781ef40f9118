//! Closed-form partial derivatives of the regularized floor friction.
//!
//! With `vel = (x − x₀)/dt`, `s = |vel|`, `u = vel/s` and `P = I − u·uᵀ`,
//! the in-plane friction force is
//!
//! ```text
//! fr = −γ(s) · μ · fn · u
//! ```
//!
//! where `γ = 1` when sliding and `γ = 2/(1 + e^(−K2·s)) − 1` in the
//! transitional band. Its partials with respect to the current in-plane
//! position and to the normal force magnitude are:
//!
//! ```text
//! sliding:       ∂fr/∂x  = −μ·fn / (dt·s) · P
//!                ∂fr/∂fn = −μ · u
//!
//! transitional:  γ'      = 2·K2·e^(−K2·s) / (1 + e^(−K2·s))²
//!                ∂fr/∂x  = −μ·fn / dt · (γ'·u·uᵀ + γ/s · P)
//!                ∂fr/∂fn = −μ · γ · u
//! ```
//!
//! Both entry points require `s > 0`; the static regime (`s = 0`) never
//! reaches the backend.

use nalgebra::{Matrix2, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of scalars in a [`FrictionJacobianInput`].
pub const FRICTION_INPUT_LEN: usize = 8;

/// Inputs of the friction partials, in the fixed order
/// `[curr_x, curr_y, prev_x, prev_y, fn, μ, dt, K2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrictionJacobianInput {
    /// Current in-plane position.
    pub curr: Vector2<f64>,
    /// In-plane position at the start of the timestep.
    pub prev: Vector2<f64>,
    /// Normal force magnitude.
    pub normal_force: f64,
    /// Effective friction coefficient.
    pub mu: f64,
    /// Timestep.
    pub dt: f64,
    /// Friction sharpness `K2`.
    pub k2: f64,
}

impl FrictionJacobianInput {
    /// Flatten into the canonical 8-element layout.
    #[must_use]
    pub fn to_array(&self) -> [f64; FRICTION_INPUT_LEN] {
        [
            self.curr.x,
            self.curr.y,
            self.prev.x,
            self.prev.y,
            self.normal_force,
            self.mu,
            self.dt,
            self.k2,
        ]
    }

    /// Rebuild from the canonical 8-element layout.
    #[must_use]
    pub fn from_array(values: [f64; FRICTION_INPUT_LEN]) -> Self {
        Self {
            curr: Vector2::new(values[0], values[1]),
            prev: Vector2::new(values[2], values[3]),
            normal_force: values[4],
            mu: values[5],
            dt: values[6],
            k2: values[7],
        }
    }

    /// In-plane velocity `(curr − prev) / dt`.
    #[must_use]
    pub fn velocity(&self) -> Vector2<f64> {
        (self.curr - self.prev) / self.dt
    }
}

/// Partials of the in-plane friction force.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionPartials {
    /// `∂fr_a / ∂x_b` for in-plane axes `a`, `b`.
    pub dfr_dx: Matrix2<f64>,
    /// `∂fr_a / ∂fn`.
    pub dfr_dfn: Vector2<f64>,
}

impl FrictionPartials {
    /// All-zero partials.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            dfr_dx: Matrix2::zeros(),
            dfr_dfn: Vector2::zeros(),
        }
    }
}

/// Evaluators for the friction partials, one per non-static regime.
///
/// The floor contact model only sees this interface; how the partials are
/// produced (closed form, code generation, automatic differentiation) is
/// the backend's business.
pub trait FrictionPartialsBackend {
    /// Partials in the sliding regime (`γ = 1`).
    fn sliding(&self, input: &FrictionJacobianInput) -> FrictionPartials;

    /// Partials in the transitional regime (`0 < γ < 1`).
    fn transitional(&self, input: &FrictionJacobianInput) -> FrictionPartials;
}

/// Hand-derived closed-form backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClosedFormPartials;

impl ClosedFormPartials {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FrictionPartialsBackend for ClosedFormPartials {
    fn sliding(&self, input: &FrictionJacobianInput) -> FrictionPartials {
        let vel = input.velocity();
        let speed = vel.norm();
        let u = vel / speed;
        let tangent_projector = Matrix2::identity() - u * u.transpose();

        FrictionPartials {
            dfr_dx: tangent_projector * (-input.mu * input.normal_force / (input.dt * speed)),
            dfr_dfn: u * -input.mu,
        }
    }

    fn transitional(&self, input: &FrictionJacobianInput) -> FrictionPartials {
        let vel = input.velocity();
        let speed = vel.norm();
        let u = vel / speed;
        let uu = u * u.transpose();
        let tangent_projector = Matrix2::identity() - uu;

        let decay = (-input.k2 * speed).exp();
        let gamma = 2.0 / (1.0 + decay) - 1.0;
        let d_gamma = 2.0 * input.k2 * decay / ((1.0 + decay) * (1.0 + decay));

        let scale = -input.mu * input.normal_force / input.dt;
        FrictionPartials {
            dfr_dx: (uu * d_gamma + tangent_projector * (gamma / speed)) * scale,
            dfr_dfn: u * (-input.mu * gamma),
        }
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

    fn friction(input: &FrictionJacobianInput, sliding: bool) -> Vector2<f64> {
        let vel = input.velocity();
        let speed = vel.norm();
        let gamma = if sliding {
            1.0
        } else {
            2.0 / (1.0 + (-input.k2 * speed).exp()) - 1.0
        };
        -vel / speed * (gamma * input.mu * input.normal_force)
    }

    fn finite_difference(input: &FrictionJacobianInput, sliding: bool) -> FrictionPartials {
        let h = 1e-9;
        let mut partials = FrictionPartials::zero();
        for b in 0..2 {
            let mut plus = *input;
            let mut minus = *input;
            plus.curr[b] += h;
            minus.curr[b] -= h;
            let column = (friction(&plus, sliding) - friction(&minus, sliding)) / (2.0 * h);
            partials.dfr_dx.set_column(b, &column);
        }
        let hf = 1e-6;
        let mut plus = *input;
        let mut minus = *input;
        plus.normal_force += hf;
        minus.normal_force -= hf;
        partials.dfr_dfn = (friction(&plus, sliding) - friction(&minus, sliding)) / (2.0 * hf);
        partials
    }

    fn input(displacement: Vector2<f64>) -> FrictionJacobianInput {
        FrictionJacobianInput {
            curr: Vector2::new(0.3, -0.1) + displacement,
            prev: Vector2::new(0.3, -0.1),
            normal_force: 2.5,
            mu: 0.6,
            dt: 1e-2,
            k2: 15.0 / 1e-3,
        }
    }

    #[test]
    fn test_array_layout() {
        let input = input(Vector2::new(1e-4, 2e-4));
        let values = input.to_array();
        assert_eq!(values[0], input.curr.x);
        assert_eq!(values[3], input.prev.y);
        assert_eq!(values[4], 2.5);
        assert_eq!(values[7], 15_000.0);
        assert_eq!(FrictionJacobianInput::from_array(values), input);
    }

    #[test]
    fn test_sliding_matches_finite_difference() {
        // speed = |(3e-4, -4e-4)| / 1e-2 = 0.05 > slip tolerance 1e-3
        let input = input(Vector2::new(3e-4, -4e-4));
        let analytic = ClosedFormPartials.sliding(&input);
        let fd = finite_difference(&input, true);
        assert_relative_eq!(analytic.dfr_dx, fd.dfr_dx, max_relative = 1e-4, epsilon = 1e-6);
        assert_relative_eq!(analytic.dfr_dfn, fd.dfr_dfn, max_relative = 1e-6);
    }

    #[test]
    fn test_transitional_matches_finite_difference() {
        // speed = |(3e-6, 4e-6)| / 1e-2 = 5e-4 < slip tolerance 1e-3
        let input = input(Vector2::new(3e-6, 4e-6));
        let analytic = ClosedFormPartials.transitional(&input);
        let fd = finite_difference(&input, false);
        assert_relative_eq!(analytic.dfr_dx, fd.dfr_dx, max_relative = 1e-4, epsilon = 1e-3);
        assert_relative_eq!(analytic.dfr_dfn, fd.dfr_dfn, max_relative = 1e-6);
    }

    #[test]
    fn test_sliding_partials_are_tangential() {
        // Moving the node along the velocity does not rotate the friction.
        let input = input(Vector2::new(2e-3, 0.0));
        let partials = ClosedFormPartials.sliding(&input);
        let u = input.velocity().normalize();
        assert_relative_eq!(partials.dfr_dx * u, Vector2::zeros(), epsilon = 1e-12);
        assert_relative_eq!(partials.dfr_dfn.norm(), input.mu, epsilon = 1e-12);
    }
}
