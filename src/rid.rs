//! Record identifiers: `(cluster_id, cluster_position)` pairs that address
//! both rows and NodePages inside a cluster-partitioned record store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid {
    pub cluster_id: i32,
    pub cluster_position: i64,
}

impl Rid {
    pub const INVALID: Rid = Rid { cluster_id: -1, cluster_position: -1 };

    pub const fn new(cluster_id: i32, cluster_position: i64) -> Self {
        Rid { cluster_id, cluster_position }
    }

    /// A RID is invalid if it doesn't name a cluster at all — the sentinel
    /// used for "no left child" / "no parent" links.
    pub fn is_invalid(&self) -> bool {
        self.cluster_id < 0
    }

    /// Provisional RIDs (`cluster_position < -1`) are allocated in-memory
    /// before the first commit and rewritten to their final position once
    /// the record store assigns one.
    pub fn is_provisional(&self) -> bool {
        !self.is_invalid() && self.cluster_position < -1
    }

    pub fn is_persistent(&self) -> bool {
        !self.is_invalid() && !self.is_provisional()
    }

    pub fn write_tight(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.cluster_id.to_be_bytes());
        let bytes = self.cluster_position.to_be_bytes();
        out.extend_from_slice(&bytes[2..8]);
    }

    pub fn read_tight(bytes: &[u8]) -> Option<(Rid, &[u8])> {
        if bytes.len() < 10 {
            return None;
        }
        let (head, rest) = bytes.split_at(10);
        let cluster_id = i32::from_be_bytes(head[0..4].try_into().unwrap());
        let mut position_bytes = [0u8; 8];
        position_bytes[2..8].copy_from_slice(&head[4..10]);
        if position_bytes[2] & 0x80 != 0 {
            position_bytes[0] = 0xff;
            position_bytes[1] = 0xff;
        }
        let cluster_position = i64::from_be_bytes(position_bytes);
        Some((Rid { cluster_id, cluster_position }, rest))
    }

    pub const TIGHT_LEN: usize = 10;
}

impl Default for Rid {
    fn default() -> Self {
        Rid::INVALID
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster_id, self.cluster_position)
    }
}

/// Hands out provisional cluster positions, starting at -2 and counting
/// down, so provisional RIDs never collide with a legitimate `>= 0`
/// position or with the `-1` "invalid" sentinel.
pub struct ProvisionalAllocator {
    next: AtomicI64,
}

impl ProvisionalAllocator {
    pub fn new() -> Self {
        ProvisionalAllocator { next: AtomicI64::new(-2) }
    }

    pub fn allocate(&self, cluster_id: i32) -> Rid {
        let position = self.next.fetch_sub(1, Ordering::SeqCst);
        Rid::new(cluster_id, position)
    }
}

impl Default for ProvisionalAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(Rid::INVALID.is_invalid());
        assert!(!Rid::INVALID.is_provisional());
        assert!(Rid::new(0, -2).is_provisional());
        assert!(Rid::new(0, 0).is_persistent());
    }

    #[test]
    fn tight_round_trip_positive_and_negative() {
        for position in [0i64, 1, 42, -2, -1000, i64::from(i32::MAX), -(1i64 << 40)] {
            let rid = Rid::new(7, position);
            let mut buf = Vec::new();
            rid.write_tight(&mut buf);
            assert_eq!(buf.len(), Rid::TIGHT_LEN);
            let (decoded, rest) = Rid::read_tight(&buf).unwrap();
            assert_eq!(decoded, rid);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn provisional_allocator_counts_down_without_collision() {
        let allocator = ProvisionalAllocator::new();
        let a = allocator.allocate(0);
        let b = allocator.allocate(0);
        assert_ne!(a, b);
        assert!(a.is_provisional());
        assert!(b.is_provisional());
    }
}
