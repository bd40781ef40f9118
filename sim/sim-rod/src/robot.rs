//! Soft robot assembly: an ordered collection of rod limbs.

use crate::dof::LimbId;
use crate::limb::RodLimb;
use crate::{Result, SimError};

/// All limbs of a soft robot, in a fixed order.
///
/// Force models traverse limbs in insertion order, then vertices in index
/// order, so contributions and diagnostics are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoftRobot {
    limbs: Vec<RodLimb>,
}

impl SoftRobot {
    /// Create an empty assembly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a limb and return its handle.
    pub fn add_limb(&mut self, limb: RodLimb) -> LimbId {
        self.limbs.push(limb);
        LimbId::new(self.limbs.len() - 1)
    }

    /// Number of limbs.
    #[must_use]
    pub fn num_limbs(&self) -> usize {
        self.limbs.len()
    }

    /// Total number of nodes across all limbs.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.limbs.iter().map(RodLimb::num_vertices).sum()
    }

    /// Iterate limbs with their handles.
    pub fn limbs(&self) -> impl Iterator<Item = (LimbId, &RodLimb)> {
        self.limbs
            .iter()
            .enumerate()
            .map(|(i, limb)| (LimbId::new(i), limb))
    }

    /// Look up a limb.
    pub fn limb(&self, id: LimbId) -> Result<&RodLimb> {
        self.limbs
            .get(id.raw())
            .ok_or(SimError::LimbNotFound(id.raw()))
    }

    /// Look up a limb mutably.
    pub fn limb_mut(&mut self, id: LimbId) -> Result<&mut RodLimb> {
        self.limbs
            .get_mut(id.raw())
            .ok_or(SimError::LimbNotFound(id.raw()))
    }

    /// Accept the current iterate of every limb as the new start-of-step state.
    pub fn commit_step(&mut self) {
        for limb in &mut self.limbs {
            limb.commit_step();
        }
    }
}

impl FromIterator<RodLimb> for SoftRobot {
    fn from_iter<I: IntoIterator<Item = RodLimb>>(iter: I) -> Self {
        Self {
            limbs: iter.into_iter().collect(),
        }
    }
}
