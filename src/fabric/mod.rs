//! Fabric membership table.
//!
//! A fabric is one administrative domain a node has been commissioned
//! into. Each membership occupies a fixed slot; the slot number (the
//! fabric index) is the stable local handle sessions are scoped by, so a
//! slot is never silently reassigned while in use.

use tracing::{debug, warn};

use crate::error::{Result, WeaveError};

/// 64-bit operational node identifier within a fabric.
pub type NodeId = u64;

/// Local slot number identifying one fabric membership.
pub type FabricIndex = u8;

/// One fabric membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FabricInfo {
    /// This node's operational id within the fabric.
    pub node_id: NodeId,
}

/// Fixed-capacity table of fabric memberships.
#[derive(Debug)]
pub struct FabricTable {
    slots: Vec<Option<FabricInfo>>,
}

impl FabricTable {
    /// Create an empty table with the given number of slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Bind a fabric index to a node identity.
    ///
    /// Assigning the identity already held by the slot is idempotent.
    /// A slot held by a different identity is never stolen.
    pub fn assign_fabric_index(&mut self, index: FabricIndex, node_id: NodeId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(usize::from(index))
            .ok_or(WeaveError::TableFull)?;
        match slot {
            Some(info) if info.node_id == node_id => Ok(()),
            Some(_) => {
                warn!(index, "fabric index already bound to another node");
                Err(WeaveError::FabricIndexInUse(index))
            }
            None => {
                *slot = Some(FabricInfo { node_id });
                debug!(index, node_id, "fabric index assigned");
                Ok(())
            }
        }
    }

    /// Membership bound to a fabric index, if any.
    pub fn find(&self, index: FabricIndex) -> Option<&FabricInfo> {
        self.slots.get(usize::from(index))?.as_ref()
    }

    /// Release a fabric index; releasing an empty slot is a no-op.
    pub fn release_fabric_index(&mut self, index: FabricIndex) {
        if let Some(slot) = self.slots.get_mut(usize::from(index)) {
            if slot.take().is_some() {
                debug!(index, "fabric index released");
            }
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when no memberships exist.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Drop every membership, keeping capacity.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_find() {
        let mut table = FabricTable::with_capacity(4);
        table.assign_fabric_index(1, 0xAA).unwrap();
        assert_eq!(table.find(1), Some(&FabricInfo { node_id: 0xAA }));
        assert_eq!(table.find(0), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_assign_is_idempotent_for_same_identity() {
        let mut table = FabricTable::with_capacity(4);
        table.assign_fabric_index(2, 7).unwrap();
        table.assign_fabric_index(2, 7).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_conflicting_assignment_rejected() {
        let mut table = FabricTable::with_capacity(4);
        table.assign_fabric_index(2, 7).unwrap();
        assert_eq!(
            table.assign_fabric_index(2, 8),
            Err(WeaveError::FabricIndexInUse(2))
        );
        // Loser did not clobber the slot.
        assert_eq!(table.find(2), Some(&FabricInfo { node_id: 7 }));
    }

    #[test]
    fn test_out_of_range_index() {
        let mut table = FabricTable::with_capacity(2);
        assert_eq!(table.assign_fabric_index(2, 1), Err(WeaveError::TableFull));
    }

    #[test]
    fn test_release_and_reset() {
        let mut table = FabricTable::with_capacity(4);
        table.assign_fabric_index(0, 1).unwrap();
        table.assign_fabric_index(1, 2).unwrap();

        table.release_fabric_index(0);
        assert_eq!(table.find(0), None);
        // Releasing twice is harmless.
        table.release_fabric_index(0);

        table.reset();
        assert!(table.is_empty());
        // Slots stay usable after reset.
        table.assign_fabric_index(3, 9).unwrap();
        assert_eq!(table.len(), 1);
    }
}
