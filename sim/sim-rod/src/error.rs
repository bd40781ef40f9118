//! Error types for rod force evaluation.

use thiserror::Error;

/// Errors that can occur while building rod assemblies or evaluating forces.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Invalid timestep passed to a force model.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid model configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid limb geometry or material.
    #[error("invalid limb: {reason}")]
    InvalidLimb {
        /// Description of what's wrong.
        reason: String,
    },

    /// Vertex index past the end of a limb.
    #[error("vertex {vertex} out of range (limb has {num_vertices} vertices)")]
    VertexOutOfRange {
        /// The offending vertex index.
        vertex: usize,
        /// Number of vertices in the limb.
        num_vertices: usize,
    },

    /// Limb handle not present in the assembly.
    #[error("limb not found: {0}")]
    LimbNotFound(usize),

    /// Evaluation produced `NaN` or `Inf`.
    #[error("force evaluation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid limb error.
    #[must_use]
    pub fn invalid_limb(reason: impl Into<String>) -> Self {
        Self::InvalidLimb {
            reason: reason.into(),
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

/// Reject timesteps that are zero, negative, or non-finite.
pub fn validate_timestep(dt: f64) -> crate::Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidTimestep(dt))
    }
}
