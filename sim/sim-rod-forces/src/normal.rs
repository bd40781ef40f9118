//! Smoothed unilateral contact law.
//!
//! A hard contact is a complementarity condition (`gap ≥ 0`, `f ≥ 0`,
//! `gap · f = 0`) whose force jumps at `gap = 0`. Newton cannot converge on
//! that, so the normal force is replaced by a smooth log-barrier-like
//! surrogate of the gap:
//!
//! ```text
//! v(gap)  = exp(−K1 · gap)
//! fn(gap) = k · 2v · ln(1 + v) / (K1 · (1 + v))
//! ```
//!
//! `K1 = 15/δ`. At `gap = δ`, `v = e⁻¹⁵` and the force is ~1e-13·k; it
//! grows monotonically as the gap closes and keeps growing past zero
//! into penetration. Callers skip vertices with `gap > δ` before evaluating,
//! which keeps `v` bounded for separated vertices.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Normal force magnitude and its derivative at one gap value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalForce {
    /// Repulsive magnitude (≥ 0).
    pub magnitude: f64,
    /// `d magnitude / d gap` (≤ 0: closing the gap pushes harder).
    pub d_magnitude_d_gap: f64,
}

/// The smoothed contact law with fixed sharpness and stiffness.
///
/// # Example
///
/// ```
/// use sim_rod_forces::SmoothNormalForce;
///
/// let law = SmoothNormalForce::new(15.0 / 0.01, 1e4);
/// let near = law.magnitude(0.001);
/// let far = law.magnitude(0.009);
/// assert!(near > far);
/// assert!(far > 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmoothNormalForce {
    /// Sharpness `K1` (1/m).
    pub k1: f64,
    /// Stiffness scale.
    pub stiffness: f64,
}

impl SmoothNormalForce {
    /// Create a contact law.
    #[must_use]
    pub fn new(k1: f64, stiffness: f64) -> Self {
        Self { k1, stiffness }
    }

    /// Force magnitude at `gap`.
    #[must_use]
    pub fn magnitude(&self, gap: f64) -> f64 {
        let v = (-self.k1 * gap).exp();
        self.magnitude_from_v(v)
    }

    /// Force magnitude and its exact gap derivative.
    ///
    /// ```text
    /// d fn / d gap = −k · 2v · (ln(1 + v) + v) / (1 + v)²
    /// ```
    ///
    /// Both are evaluated through the ratio `v / (1 + v)`, which stays in
    /// `[0, 1]`, so deep penetration saturates the stiffness at `−2k`
    /// instead of overflowing. Only `v = ∞` yields a non-finite result.
    #[must_use]
    pub fn evaluate(&self, gap: f64) -> NormalForce {
        let v = (-self.k1 * gap).exp();
        let ratio = v / (1.0 + v);

        NormalForce {
            magnitude: self.magnitude_from_v(v),
            d_magnitude_d_gap: -self.stiffness * 2.0 * ratio * ((v.ln_1p() + v) / (1.0 + v)),
        }
    }

    fn magnitude_from_v(&self, v: f64) -> f64 {
        self.stiffness * 2.0 * (v / (1.0 + v)) * v.ln_1p() / self.k1
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

    fn law() -> SmoothNormalForce {
        SmoothNormalForce::new(15.0 / 0.01, 1e4)
    }

    #[test]
    fn test_matches_closed_form() {
        let law = law();
        let gap = 0.004;
        let v = (-law.k1 * gap).exp();
        // Signed form written as `−2v·ln(v+1) / (K1·(v+1))`.
        let signed = law.stiffness * (-2.0 * v * (v + 1.0).ln()) / (law.k1 * (v + 1.0));
        assert_relative_eq!(law.magnitude(gap), -signed, max_relative = 1e-12);
    }

    #[test]
    fn test_monotone_in_gap() {
        let law = law();
        let mut previous = 0.0;
        for step in (0..=100).rev() {
            let gap = 0.01 * f64::from(step) / 100.0;
            let f = law.magnitude(gap);
            assert!(f >= previous, "force dropped at gap {gap}");
            previous = f;
        }
    }

    #[test]
    fn test_vanishes_at_band_edge() {
        let law = law();
        let at_edge = law.magnitude(0.01);
        let at_contact = law.magnitude(0.0);
        assert!(at_edge < 1e-10 * at_contact);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let law = law();
        for &gap in &[-0.002, 0.0, 0.001, 0.005, 0.009] {
            let h = 1e-8;
            let fd = (law.magnitude(gap + h) - law.magnitude(gap - h)) / (2.0 * h);
            let analytic = law.evaluate(gap).d_magnitude_d_gap;
            assert_relative_eq!(analytic, fd, max_relative = 1e-5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_deep_penetration_stays_finite() {
        let law = law();
        // v = exp(1500 · 0.3) ≈ 1e195: v² overflows, the ratio form does not.
        let deep = law.evaluate(-0.3);
        assert!(deep.magnitude.is_finite());
        assert!(deep.d_magnitude_d_gap.is_finite());
        assert_relative_eq!(
            deep.magnitude,
            2.0 * law.stiffness * 450.0 / law.k1,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            deep.d_magnitude_d_gap,
            -2.0 * law.stiffness,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_overflowed_exponent_is_not_finite() {
        let law = SmoothNormalForce::new(15.0 / 1e-4, 1e4);
        let overflow = law.evaluate(-1.0);
        assert!(!overflow.magnitude.is_finite());
        assert!(!overflow.d_magnitude_d_gap.is_finite());
    }

    #[test]
    fn test_evaluate_consistent_with_magnitude() {
        let law = law();
        let gap = 0.0025;
        assert_eq!(law.evaluate(gap).magnitude, law.magnitude(gap));
    }
}
