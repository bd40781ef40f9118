//! Degree-of-freedom addressing for rod limbs.
//!
//! Every rod node owns four DOF slots inside its limb:
//!
//! ```text
//! 4i + 0, 4i + 1, 4i + 2   translational x, y, z
//! 4i + 3                   twist of the edge leaving node i (or a joint DOF)
//! ```
//!
//! A DOF is always addressed as a (limb, local offset) pair. Force writes
//! carry a [`DofIndex`]; Jacobian writes take a single [`LimbId`] and two
//! [`LocalDof`]s, so a Jacobian entry coupling two different limbs cannot
//! be expressed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of DOF slots owned by each rod node.
pub const DOFS_PER_VERTEX: usize = 4;

/// Number of translational DOFs per rod node.
pub const TRANSLATIONAL_DOFS: usize = 3;

/// Handle of a limb inside a [`SoftRobot`](crate::SoftRobot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LimbId(pub usize);

impl LimbId {
    /// Create a new limb handle.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl From<usize> for LimbId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for LimbId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Limb({})", self.0)
    }
}

/// DOF offset within a single limb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalDof(pub usize);

impl LocalDof {
    /// Translational DOF `axis` (0, 1 or 2) of node `vertex`.
    #[must_use]
    pub const fn translational(vertex: usize, axis: usize) -> Self {
        debug_assert!(axis < TRANSLATIONAL_DOFS);
        Self(DOFS_PER_VERTEX * vertex + axis)
    }

    /// Twist DOF of the edge leaving node `vertex`.
    #[must_use]
    pub const fn twist(vertex: usize) -> Self {
        Self(DOFS_PER_VERTEX * vertex + TRANSLATIONAL_DOFS)
    }

    /// Get the raw offset.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Node this DOF belongs to.
    #[must_use]
    pub const fn vertex(self) -> usize {
        self.0 / DOFS_PER_VERTEX
    }

    /// Slot within the node (0..=2 translational, 3 twist).
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0 % DOFS_PER_VERTEX
    }

    /// Whether this is one of the three translational slots.
    #[must_use]
    pub const fn is_translational(self) -> bool {
        self.slot() < TRANSLATIONAL_DOFS
    }
}

/// A DOF fully qualified by its owning limb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DofIndex {
    /// Owning limb.
    pub limb: LimbId,
    /// Offset inside the limb.
    pub local: LocalDof,
}

impl DofIndex {
    /// Create a DOF index from its parts.
    #[must_use]
    pub const fn new(limb: LimbId, local: LocalDof) -> Self {
        Self { limb, local }
    }

    /// Translational DOF `axis` of node `vertex` in `limb`.
    #[must_use]
    pub const fn translational(limb: LimbId, vertex: usize, axis: usize) -> Self {
        Self::new(limb, LocalDof::translational(vertex, axis))
    }
}

impl std::fmt::Display for DofIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.limb, self.local.0)
    }
}

/// Number of DOFs of a limb with `num_vertices` nodes.
///
/// The last node has no outgoing edge, so it carries no twist slot.
#[must_use]
pub const fn limb_dof_count(num_vertices: usize) -> usize {
    if num_vertices == 0 {
        0
    } else {
        DOFS_PER_VERTEX * num_vertices - 1
    }
}
