//! Fixed-capacity consistent-hash ring.
//!
//! The ring is a circular array of slots, each holding at most one
//! [`VirtualNode`]. Virtual nodes are placed at their hashed slot with
//! linear probing on collision; request keys resolve to the first occupied
//! slot at or after their hashed position, wrapping around. Adding or
//! removing a replica therefore only remaps keys that fell inside its
//! virtual nodes' territory.

use crate::hash::hash_to_range;
use thiserror::Error;

/// Errors produced by ring operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    /// Every slot is occupied; no more virtual nodes can be admitted.
    #[error("hash ring full: all {capacity} slots occupied")]
    Full {
        /// Total slot count of the ring.
        capacity: usize,
    },

    /// No slot is occupied; there is nothing to resolve to.
    #[error("hash ring is empty: no replicas registered")]
    Empty,
}

/// Result type for ring operations.
pub type RingResult<T> = Result<T, RingError>;

/// One ring position owned by a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualNode {
    /// Stable id of the owning replica.
    pub server_id: u64,
    /// Which of the replica's virtual nodes this is.
    pub virtual_index: u16,
}

/// Circular slot array implementing consistent hashing.
#[derive(Debug)]
pub struct HashRing {
    slots: Vec<Option<VirtualNode>>,
    occupied: usize,
}

impl HashRing {
    /// Create an empty ring with the given number of slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            occupied: 0,
        }
    }

    /// Total slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Check whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Preferred slot for a virtual node, before probing.
    fn placement_slot(&self, server_id: u64, virtual_index: u16) -> usize {
        hash_to_range(
            &format!("{server_id}-{virtual_index}"),
            self.slots.len() as u64,
        ) as usize
    }

    /// Insert a virtual node, probing linearly past occupied slots.
    ///
    /// Returns the slot index the node landed on.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::Full`] when every slot has been visited without
    /// finding a free one. The caller is responsible for rolling back any
    /// sibling virtual nodes it already inserted for the same replica.
    pub fn insert(&mut self, server_id: u64, virtual_index: u16) -> RingResult<usize> {
        let capacity = self.slots.len();
        let start = self.placement_slot(server_id, virtual_index);

        for offset in 0..capacity {
            let index = (start + offset) % capacity;
            if self.slots[index].is_none() {
                self.slots[index] = Some(VirtualNode {
                    server_id,
                    virtual_index,
                });
                self.occupied += 1;
                return Ok(index);
            }
        }

        Err(RingError::Full { capacity })
    }

    /// Clear the slot holding exactly this `(server_id, virtual_index)` pair.
    ///
    /// Returns `true` if a slot was cleared. Must be called for every
    /// virtual index of a replica being destroyed, or the ring accumulates
    /// stale entries that no longer resolve to a registered replica.
    pub fn remove(&mut self, server_id: u64, virtual_index: u16) -> bool {
        let target = VirtualNode {
            server_id,
            virtual_index,
        };

        for slot in &mut self.slots {
            if *slot == Some(target) {
                *slot = None;
                self.occupied -= 1;
                return true;
            }
        }

        false
    }

    /// Resolve a request key to the nearest occupied slot clockwise.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::Empty`] when no slot is occupied.
    pub fn resolve(&self, request_key: &str) -> RingResult<VirtualNode> {
        if self.occupied == 0 {
            return Err(RingError::Empty);
        }

        let capacity = self.slots.len();
        let start = hash_to_range(&format!("request-{request_key}"), capacity as u64) as usize;

        for offset in 0..capacity {
            let index = (start + offset) % capacity;
            if let Some(node) = self.slots[index] {
                return Ok(node);
            }
        }

        Err(RingError::Empty)
    }

    /// Slot index currently holding this pair, if any.
    #[must_use]
    pub fn slot_of(&self, server_id: u64, virtual_index: u16) -> Option<usize> {
        let target = VirtualNode {
            server_id,
            virtual_index,
        };
        self.slots.iter().position(|slot| *slot == Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_lands_on_preferred_slot() {
        let mut ring = HashRing::with_capacity(512);
        let preferred = ring.placement_slot(42, 0);

        let slot = ring.insert(42, 0).unwrap();
        assert_eq!(slot, preferred);
        assert_eq!(ring.occupied(), 1);
    }

    #[test]
    fn test_collision_probes_forward() {
        // Two inserts of the same pair share a preferred slot, so the
        // second is forced onto the next free slot.
        let mut ring = HashRing::with_capacity(8);
        let first = ring.insert(1, 0).unwrap();
        let second = ring.insert(1, 0).unwrap();

        assert_eq!(second, (first + 1) % 8);
        assert_eq!(ring.occupied(), 2);
    }

    #[test]
    fn test_full_ring_rejects_insert() {
        let mut ring = HashRing::with_capacity(3);
        for v in 0..3 {
            ring.insert(7, v).unwrap();
        }

        let err = ring.insert(7, 3).unwrap_err();
        assert_eq!(err, RingError::Full { capacity: 3 });
        assert_eq!(ring.occupied(), 3);
    }

    #[test]
    fn test_remove_frees_slot() {
        let mut ring = HashRing::with_capacity(512);
        ring.insert(42, 0).unwrap();
        ring.insert(42, 1).unwrap();

        assert!(ring.remove(42, 0));
        assert_eq!(ring.occupied(), 1);
        assert_eq!(ring.slot_of(42, 0), None);

        // The freed slot is reusable.
        ring.insert(42, 0).unwrap();
        assert_eq!(ring.occupied(), 2);
    }

    #[test]
    fn test_remove_missing_pair_is_noop() {
        let mut ring = HashRing::with_capacity(16);
        ring.insert(1, 0).unwrap();

        assert!(!ring.remove(1, 1));
        assert!(!ring.remove(2, 0));
        assert_eq!(ring.occupied(), 1);
    }

    #[test]
    fn test_resolve_empty_ring() {
        let ring = HashRing::with_capacity(512);
        assert_eq!(ring.resolve("123456").unwrap_err(), RingError::Empty);
    }

    #[test]
    fn test_resolve_finds_sole_occupant() {
        let mut ring = HashRing::with_capacity(512);
        ring.insert(42, 3).unwrap();

        // Any key must wrap around to the single occupied slot.
        for key in ["1", "999999", "abc"] {
            let node = ring.resolve(key).unwrap();
            assert_eq!(node.server_id, 42);
            assert_eq!(node.virtual_index, 3);
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let mut ring = HashRing::with_capacity(512);
        for v in 0..9 {
            ring.insert(11, v).unwrap();
            ring.insert(22, v).unwrap();
        }

        let first = ring.resolve("314159").unwrap();
        let second = ring.resolve("314159").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_removal_moves_only_affected_keys() {
        let mut ring = HashRing::with_capacity(512);
        for v in 0..9 {
            ring.insert(11, v).unwrap();
            ring.insert(22, v).unwrap();
        }

        let keys: Vec<String> = (0..200).map(|i| format!("{}", 100_000 + i)).collect();
        let before: Vec<VirtualNode> = keys.iter().map(|k| ring.resolve(k).unwrap()).collect();

        for v in 0..9 {
            assert!(ring.remove(11, v));
        }

        for (key, old) in keys.iter().zip(&before) {
            let new = ring.resolve(key).unwrap();
            assert_eq!(new.server_id, 22);
            if old.server_id == 22 {
                // Keys that already resolved to the surviving replica must
                // not have moved.
                assert_eq!(new, *old);
            }
        }
    }

    #[test]
    fn test_occupancy_tracks_insert_remove_sequences() {
        let mut ring = HashRing::with_capacity(64);

        for v in 0..9 {
            ring.insert(1, v).unwrap();
        }
        for v in 0..9 {
            ring.insert(2, v).unwrap();
        }
        assert_eq!(ring.occupied(), 18);

        for v in 0..9 {
            assert!(ring.remove(1, v));
        }
        assert_eq!(ring.occupied(), 9);

        for v in 0..9 {
            assert!(ring.remove(2, v));
        }
        assert!(ring.is_empty());
    }
}
