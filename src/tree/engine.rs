//! The red-black tree logic over `NodePage`s: search, insert, split,
//! rebalance, delete, fixup, plus the commit/optimize machinery that
//! drives it against a record store.

use crate::config::TreeConfig;
use crate::rid::{ProvisionalAllocator, Rid};
use crate::serializer::Codec;
use crate::store::RecordStore;
use crate::tree::cache::{EntryPoints, NodeCache};
use crate::tree::commit::CommitBuffer;
use crate::tree::descriptor::TreeDescriptor;
use crate::tree::error::TreeError;
use crate::tree::node_page::{Color, NodePage};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct TreeEngine<K, V> {
    config: TreeConfig,
    store: Arc<dyn RecordStore>,
    cluster_id: i32,
    allocator: ProvisionalAllocator,
    cache: NodeCache<K, V>,
    entry_points: EntryPoints<K>,
    commit: CommitBuffer,
    descriptor: TreeDescriptor,
    descriptor_rid: Rid,
    descriptor_dirty: bool,
    usage_counter: u64,
}

impl<K, V> TreeEngine<K, V>
where
    K: Codec + Ord + Clone,
    V: Codec + Clone,
{
    /// Creates a brand-new, empty tree and persists its descriptor so the
    /// caller gets back a stable RID to reopen it by.
    pub fn create(
        store: Arc<dyn RecordStore>,
        cluster_id: i32,
        config: TreeConfig,
    ) -> Result<Self, TreeError> {
        let descriptor = TreeDescriptor::new(config.node_page_size, K::NAME, V::NAME);
        let descriptor_rid = store
            .create(cluster_id, descriptor.to_bytes())
            .map_err(|e| TreeError::storage_io(Rid::INVALID, e))?;
        Ok(TreeEngine {
            entry_points: EntryPoints::new(config.entry_points_size),
            config,
            store,
            cluster_id,
            allocator: ProvisionalAllocator::new(),
            cache: NodeCache::new(),
            commit: CommitBuffer::new(),
            descriptor,
            descriptor_rid,
            descriptor_dirty: false,
            usage_counter: 0,
        })
    }

    /// Reopens a tree from nothing but its descriptor RID (§8 scenario 2).
    pub fn open(
        store: Arc<dyn RecordStore>,
        cluster_id: i32,
        config: TreeConfig,
        descriptor_rid: Rid,
    ) -> Result<Self, TreeError> {
        let bytes = store
            .read(descriptor_rid)
            .map_err(|e| TreeError::storage_io(descriptor_rid, e))?;
        let descriptor = TreeDescriptor::from_bytes(&bytes)?;
        Ok(TreeEngine {
            entry_points: EntryPoints::new(config.entry_points_size),
            config,
            store,
            cluster_id,
            allocator: ProvisionalAllocator::new(),
            cache: NodeCache::new(),
            commit: CommitBuffer::new(),
            descriptor,
            descriptor_rid,
            descriptor_dirty: false,
            usage_counter: 0,
        })
    }

    pub fn descriptor_rid(&self) -> Rid {
        self.descriptor_rid
    }

    pub fn size(&self) -> i64 {
        self.descriptor.size
    }

    #[cfg(feature = "testing-api")]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    #[cfg(feature = "testing-api")]
    pub fn entry_point_count(&self) -> usize {
        self.entry_points.len()
    }

    #[cfg(feature = "testing-api")]
    pub fn commit_pending(&self) -> usize {
        self.commit.len()
    }

    #[cfg(feature = "testing-api")]
    pub fn root_rid(&self) -> Rid {
        self.descriptor.root_rid
    }

    fn ensure_loaded(&mut self, rid: Rid) -> Result<(), TreeError> {
        if rid.is_invalid() || self.cache.contains(&rid) {
            return Ok(());
        }
        let bytes = self.store.read(rid).map_err(|e| TreeError::storage_io(rid, e))?;
        let node = NodePage::<K, V>::from_bytes(rid, &bytes)?;
        trace!(?rid, "loaded node page from store");
        self.cache.insert(node);
        Ok(())
    }

    fn node_color(&mut self, rid: Rid) -> Result<Color, TreeError> {
        if rid.is_invalid() {
            return Ok(Color::Black);
        }
        self.ensure_loaded(rid)?;
        Ok(self.cache.get(&rid).expect("just loaded").color)
    }

    fn node_parent(&mut self, rid: Rid) -> Result<Rid, TreeError> {
        if rid.is_invalid() {
            return Ok(Rid::INVALID);
        }
        self.ensure_loaded(rid)?;
        Ok(self.cache.get(&rid).expect("just loaded").parent_rid)
    }

    fn node_left(&mut self, rid: Rid) -> Result<Rid, TreeError> {
        if rid.is_invalid() {
            return Ok(Rid::INVALID);
        }
        self.ensure_loaded(rid)?;
        Ok(self.cache.get(&rid).expect("just loaded").left_rid)
    }

    fn node_right(&mut self, rid: Rid) -> Result<Rid, TreeError> {
        if rid.is_invalid() {
            return Ok(Rid::INVALID);
        }
        self.ensure_loaded(rid)?;
        Ok(self.cache.get(&rid).expect("just loaded").right_rid)
    }

    fn set_color(&mut self, rid: Rid, color: Color) -> Result<(), TreeError> {
        if rid.is_invalid() {
            return Ok(());
        }
        self.ensure_loaded(rid)?;
        let node = self.cache.get_mut(&rid).expect("just loaded");
        node.color = color;
        node.dirty = true;
        self.commit.mark(rid);
        Ok(())
    }

    fn set_left(&mut self, rid: Rid, child: Rid) -> Result<(), TreeError> {
        if rid.is_invalid() {
            return Ok(());
        }
        self.ensure_loaded(rid)?;
        let node = self.cache.get_mut(&rid).expect("just loaded");
        node.left_rid = child;
        node.dirty = true;
        self.commit.mark(rid);
        Ok(())
    }

    fn set_right(&mut self, rid: Rid, child: Rid) -> Result<(), TreeError> {
        if rid.is_invalid() {
            return Ok(());
        }
        self.ensure_loaded(rid)?;
        let node = self.cache.get_mut(&rid).expect("just loaded");
        node.right_rid = child;
        node.dirty = true;
        self.commit.mark(rid);
        Ok(())
    }

    fn set_parent(&mut self, rid: Rid, parent: Rid) -> Result<(), TreeError> {
        if rid.is_invalid() {
            return Ok(());
        }
        self.ensure_loaded(rid)?;
        let node = self.cache.get_mut(&rid).expect("just loaded");
        node.parent_rid = parent;
        node.dirty = true;
        self.commit.mark(rid);
        Ok(())
    }

    fn minimum_node(&mut self, mut rid: Rid) -> Result<Rid, TreeError> {
        loop {
            let left = self.node_left(rid)?;
            if left.is_invalid() {
                return Ok(rid);
            }
            rid = left;
        }
    }

    fn maximum_node(&mut self, mut rid: Rid) -> Result<Rid, TreeError> {
        loop {
            let right = self.node_right(rid)?;
            if right.is_invalid() {
                return Ok(rid);
            }
            rid = right;
        }
    }

    /// Walks from the best entry point for `key` down to the node whose
    /// `[first_key, last_key]` range should hold it, or the node a new key
    /// would be inserted into (possibly extending that node's range).
    fn locate_node(&mut self, key: &K) -> Result<Rid, TreeError> {
        let start = self.entry_points.best_for(key).unwrap_or(self.descriptor.root_rid);
        let mut current = start;
        loop {
            self.ensure_loaded(current)?;
            let (min, max, left, right) = {
                let node = self.cache.get_mut(&current).expect("just loaded");
                let min = node.first_key()?.cloned();
                let max = node.last_key()?.cloned();
                (min, max, node.left_rid, node.right_rid)
            };
            let (min, max) = match (min, max) {
                (Some(min), Some(max)) => (min, max),
                _ => return Ok(current),
            };
            if key < &min {
                if left.is_invalid() {
                    return Ok(current);
                }
                current = left;
            } else if key > &max {
                if right.is_invalid() {
                    return Ok(current);
                }
                current = right;
            } else {
                return Ok(current);
            }
        }
    }

    fn touch_descent(&mut self, rid: Rid) {
        self.entry_points.touch(rid);
        self.usage_counter += 1;
    }

    fn maybe_optimize(&mut self) -> Result<(), TreeError> {
        if self.config.optimize_enabled() && self.usage_counter >= self.config.optimize_threshold {
            self.optimize()?;
        }
        Ok(())
    }

    pub fn get(&mut self, key: &K) -> Result<Option<V>, TreeError> {
        if self.descriptor.root_rid.is_invalid() {
            return Ok(None);
        }
        let rid = self.locate_node(key)?;
        self.touch_descent(rid);
        let result = match self.cache.get_mut(&rid).expect("located").locate(key)? {
            Ok(idx) => Some(self.cache.get_mut(&rid).expect("located").value_at(idx)?.clone()),
            Err(_) => None,
        };
        self.maybe_optimize()?;
        Ok(result)
    }

    pub fn put(&mut self, key: K, value: V) -> Result<Option<V>, TreeError> {
        self.descriptor_dirty = true;
        if self.descriptor.root_rid.is_invalid() {
            let root_rid = self.allocator.allocate(self.cluster_id);
            let mut root = NodePage::new(root_rid, self.config.node_page_size, Color::Black);
            root.insert_slot_at(0, key, value);
            self.cache.insert(root);
            self.commit.mark(root_rid);
            self.descriptor.root_rid = root_rid;
            self.descriptor.size = 1;
            self.entry_points.consider_promote(root_rid, self.cache.get_mut(&root_rid).unwrap().key_at(0)?.clone());
            self.maybe_optimize()?;
            return Ok(None);
        }

        let rid = self.locate_node(&key)?;
        self.touch_descent(rid);
        let located = self.cache.get_mut(&rid).expect("located").locate(&key)?;
        let result = match located {
            Ok(idx) => {
                let old = self.cache.get_mut(&rid).expect("located").value_at(idx)?.clone();
                self.cache.get_mut(&rid).expect("located").set_value(idx, value)?;
                self.commit.mark(rid);
                Some(old)
            }
            Err(idx) => {
                let node = self.cache.get_mut(&rid).expect("located");
                node.insert_slot_at(idx, key, value);
                self.commit.mark(rid);
                self.descriptor.size += 1;
                let overflowed = node.count() >= node.page_size as usize;
                if overflowed {
                    self.split(rid)?;
                }
                None
            }
        };
        self.maybe_optimize()?;
        Ok(result)
    }

    /// Splits an overflowing node: it keeps only its median slot and
    /// spawns two new children holding the lower/upper halves, inheriting
    /// its old `left_rid`/`right_rid` respectively. See DESIGN.md Open
    /// Question #4 for why this — not a promotion into a parent's slot
    /// array — is what "split" means at this data model's two-child,
    /// multi-slot node shape.
    fn split(&mut self, rid: Rid) -> Result<(), TreeError> {
        let page_size = self.cache.get(&rid).expect("present").page_size;
        let median_index = page_size as usize / 2;
        let (old_left, old_right) = {
            let node = self.cache.get(&rid).expect("present");
            (node.left_rid, node.right_rid)
        };

        let (mut all_keys, mut all_values) = self.cache.get_mut(&rid).expect("present").take_all_slots();
        let median_key = all_keys.remove(median_index);
        let median_value = all_values.remove(median_index);
        let upper_keys = all_keys.split_off(median_index);
        let upper_values = all_values.split_off(median_index);
        let lower_keys = all_keys;
        let lower_values = all_values;

        let left_rid = self.allocator.allocate(self.cluster_id);
        let right_rid = self.allocator.allocate(self.cluster_id);

        let mut left_node = NodePage::new(left_rid, page_size, Color::Red);
        left_node.parent_rid = rid;
        left_node.left_rid = old_left;
        left_node.restore_slots(lower_keys, lower_values);

        let mut right_node = NodePage::new(right_rid, page_size, Color::Red);
        right_node.parent_rid = rid;
        right_node.right_rid = old_right;
        right_node.restore_slots(upper_keys, upper_values);

        if !old_left.is_invalid() {
            self.ensure_loaded(old_left)?;
            self.cache.get_mut(&old_left).expect("loaded").parent_rid = left_rid;
            self.cache.get_mut(&old_left).expect("loaded").dirty = true;
            self.commit.mark(old_left);
        }
        if !old_right.is_invalid() {
            self.ensure_loaded(old_right)?;
            self.cache.get_mut(&old_right).expect("loaded").parent_rid = right_rid;
            self.cache.get_mut(&old_right).expect("loaded").dirty = true;
            self.commit.mark(old_right);
        }

        self.cache.insert(left_node);
        self.cache.insert(right_node);
        self.commit.mark(left_rid);
        self.commit.mark(right_rid);

        {
            let node = self.cache.get_mut(&rid).expect("present");
            node.restore_slots(vec![median_key], vec![median_value]);
            node.left_rid = left_rid;
            node.right_rid = right_rid;
        }
        self.commit.mark(rid);
        debug!(?rid, ?left_rid, ?right_rid, "split overflowing node");

        self.insert_fixup(left_rid)?;
        self.insert_fixup(right_rid)?;
        Ok(())
    }

    fn left_rotate(&mut self, x: Rid) -> Result<(), TreeError> {
        let y = self.node_right(x)?;
        let y_left = self.node_left(y)?;
        self.set_right(x, y_left)?;
        if !y_left.is_invalid() {
            self.set_parent(y_left, x)?;
        }
        let x_parent = self.node_parent(x)?;
        self.set_parent(y, x_parent)?;
        if x_parent.is_invalid() {
            self.descriptor.root_rid = y;
            self.descriptor_dirty = true;
        } else if self.node_left(x_parent)? == x {
            self.set_left(x_parent, y)?;
        } else {
            self.set_right(x_parent, y)?;
        }
        self.set_left(y, x)?;
        self.set_parent(x, y)?;
        Ok(())
    }

    fn right_rotate(&mut self, x: Rid) -> Result<(), TreeError> {
        let y = self.node_left(x)?;
        let y_right = self.node_right(y)?;
        self.set_left(x, y_right)?;
        if !y_right.is_invalid() {
            self.set_parent(y_right, x)?;
        }
        let x_parent = self.node_parent(x)?;
        self.set_parent(y, x_parent)?;
        if x_parent.is_invalid() {
            self.descriptor.root_rid = y;
            self.descriptor_dirty = true;
        } else if self.node_right(x_parent)? == x {
            self.set_right(x_parent, y)?;
        } else {
            self.set_left(x_parent, y)?;
        }
        self.set_right(y, x)?;
        self.set_parent(x, y)?;
        Ok(())
    }

    /// CLRS RB-INSERT-FIXUP, run once per newly-created red child. A split
    /// creates two new red children at once, so this runs twice in a row
    /// (see DESIGN.md Open Question #4) — each call is an ordinary single
    /// red-leaf fixup, composed.
    fn insert_fixup(&mut self, mut z: Rid) -> Result<(), TreeError> {
        loop {
            let parent = self.node_parent(z)?;
            if parent.is_invalid() || self.node_color(parent)? == Color::Black {
                break;
            }
            let grandparent = self.node_parent(parent)?;
            if grandparent.is_invalid() {
                break;
            }
            if parent == self.node_left(grandparent)? {
                let uncle = self.node_right(grandparent)?;
                if self.node_color(uncle)? == Color::Red {
                    self.set_color(parent, Color::Black)?;
                    self.set_color(uncle, Color::Black)?;
                    self.set_color(grandparent, Color::Red)?;
                    z = grandparent;
                } else {
                    let mut z2 = z;
                    let mut p2 = parent;
                    if z2 == self.node_right(p2)? {
                        z2 = p2;
                        self.left_rotate(z2)?;
                        p2 = self.node_parent(z2)?;
                    }
                    self.set_color(p2, Color::Black)?;
                    let gp2 = self.node_parent(p2)?;
                    self.set_color(gp2, Color::Red)?;
                    self.right_rotate(gp2)?;
                    z = p2;
                }
            } else {
                let uncle = self.node_left(grandparent)?;
                if self.node_color(uncle)? == Color::Red {
                    self.set_color(parent, Color::Black)?;
                    self.set_color(uncle, Color::Black)?;
                    self.set_color(grandparent, Color::Red)?;
                    z = grandparent;
                } else {
                    let mut z2 = z;
                    let mut p2 = parent;
                    if z2 == self.node_left(p2)? {
                        z2 = p2;
                        self.right_rotate(z2)?;
                        p2 = self.node_parent(z2)?;
                    }
                    self.set_color(p2, Color::Black)?;
                    let gp2 = self.node_parent(p2)?;
                    self.set_color(gp2, Color::Red)?;
                    self.left_rotate(gp2)?;
                    z = p2;
                }
            }
        }
        let root = self.descriptor.root_rid;
        if !root.is_invalid() {
            self.set_color(root, Color::Black)?;
        }
        Ok(())
    }

    fn transplant(&mut self, u: Rid, v: Rid) -> Result<(), TreeError> {
        let u_parent = self.node_parent(u)?;
        if u_parent.is_invalid() {
            self.descriptor.root_rid = v;
            self.descriptor_dirty = true;
        } else if self.node_left(u_parent)? == u {
            self.set_left(u_parent, v)?;
        } else {
            self.set_right(u_parent, v)?;
        }
        if !v.is_invalid() {
            self.set_parent(v, u_parent)?;
        }
        Ok(())
    }

    /// CLRS RB-DELETE-FIXUP. `x` may be `Rid::INVALID` (the CLRS `nil`
    /// sentinel); its logical parent is tracked separately in `x_parent`
    /// since an invalid RID has no cache entry to hold one.
    fn delete_fixup(&mut self, mut x: Rid, mut x_parent: Rid) -> Result<(), TreeError> {
        loop {
            let is_root = x == self.descriptor.root_rid && !x.is_invalid();
            if is_root || self.node_color(x)? == Color::Black && x_parent.is_invalid() {
                break;
            }
            if self.node_color(x)? == Color::Black {
                if x_parent.is_invalid() {
                    break;
                }
                if x == self.node_left(x_parent)? {
                    let mut w = self.node_right(x_parent)?;
                    if self.node_color(w)? == Color::Red {
                        self.set_color(w, Color::Black)?;
                        self.set_color(x_parent, Color::Red)?;
                        self.left_rotate(x_parent)?;
                        w = self.node_right(x_parent)?;
                    }
                    let w_left = self.node_left(w)?;
                    let w_right = self.node_right(w)?;
                    if self.node_color(w_left)? == Color::Black && self.node_color(w_right)? == Color::Black {
                        self.set_color(w, Color::Red)?;
                        x = x_parent;
                        x_parent = self.node_parent(x)?;
                    } else {
                        if self.node_color(w_right)? == Color::Black {
                            self.set_color(w_left, Color::Black)?;
                            self.set_color(w, Color::Red)?;
                            self.right_rotate(w)?;
                            w = self.node_right(x_parent)?;
                        }
                        self.set_color(w, self.node_color(x_parent)?)?;
                        self.set_color(x_parent, Color::Black)?;
                        let w_right = self.node_right(w)?;
                        self.set_color(w_right, Color::Black)?;
                        self.left_rotate(x_parent)?;
                        x = self.descriptor.root_rid;
                        x_parent = Rid::INVALID;
                    }
                } else {
                    let mut w = self.node_left(x_parent)?;
                    if self.node_color(w)? == Color::Red {
                        self.set_color(w, Color::Black)?;
                        self.set_color(x_parent, Color::Red)?;
                        self.right_rotate(x_parent)?;
                        w = self.node_left(x_parent)?;
                    }
                    let w_left = self.node_left(w)?;
                    let w_right = self.node_right(w)?;
                    if self.node_color(w_right)? == Color::Black && self.node_color(w_left)? == Color::Black {
                        self.set_color(w, Color::Red)?;
                        x = x_parent;
                        x_parent = self.node_parent(x)?;
                    } else {
                        if self.node_color(w_left)? == Color::Black {
                            self.set_color(w_right, Color::Black)?;
                            self.set_color(w, Color::Red)?;
                            self.left_rotate(w)?;
                            w = self.node_left(x_parent)?;
                        }
                        self.set_color(w, self.node_color(x_parent)?)?;
                        self.set_color(x_parent, Color::Black)?;
                        let w_left = self.node_left(w)?;
                        self.set_color(w_left, Color::Black)?;
                        self.right_rotate(x_parent)?;
                        x = self.descriptor.root_rid;
                        x_parent = Rid::INVALID;
                    }
                }
            } else {
                break;
            }
        }
        if !x.is_invalid() {
            self.set_color(x, Color::Black)?;
        }
        Ok(())
    }

    fn splice_out_empty_node(&mut self, rid: Rid) -> Result<(), TreeError> {
        let (left, right, color) = {
            let node = self.cache.get(&rid).expect("present");
            (node.left_rid, node.right_rid, node.color)
        };

        let (x, x_parent, spliced_color);
        if left.is_invalid() {
            x = right;
            x_parent = self.node_parent(rid)?;
            self.transplant(rid, right)?;
            spliced_color = color;
        } else if right.is_invalid() {
            x = left;
            x_parent = self.node_parent(rid)?;
            self.transplant(rid, left)?;
            spliced_color = color;
        } else {
            let y = self.minimum_node(right)?;
            let y_original_color = self.node_color(y)?;
            let x_local = self.node_right(y)?;
            let x_parent_local;
            if self.node_parent(y)? == rid {
                x_parent_local = y;
            } else {
                x_parent_local = self.node_parent(y)?;
                self.transplant(y, x_local)?;
                self.set_right(y, right)?;
                self.set_parent(right, y)?;
            }
            self.transplant(rid, y)?;
            self.set_left(y, left)?;
            self.set_parent(left, y)?;
            self.set_color(y, color)?;
            x = x_local;
            x_parent = x_parent_local;
            spliced_color = y_original_color;
        }

        self.cache.remove(&rid);
        self.commit.unmark(rid);
        self.entry_points.remove(rid);
        if rid.is_persistent() {
            self.store.delete(rid).map_err(|e| TreeError::storage_io(rid, e))?;
        }

        if spliced_color == Color::Black {
            self.delete_fixup(x, x_parent)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &K) -> Result<Option<V>, TreeError> {
        if self.descriptor.root_rid.is_invalid() {
            return Ok(None);
        }
        let rid = self.locate_node(key)?;
        self.touch_descent(rid);
        let idx = match self.cache.get_mut(&rid).expect("located").locate(key)? {
            Ok(idx) => idx,
            Err(_) => return Ok(None),
        };
        self.descriptor_dirty = true;
        let (_, old_value) = self.cache.get_mut(&rid).expect("located").remove_slot_at(idx)?;
        self.descriptor.size -= 1;
        self.commit.mark(rid);

        if self.cache.get(&rid).expect("located").count() > 0 {
            self.maybe_optimize()?;
            return Ok(Some(old_value));
        }
        self.splice_out_empty_node(rid)?;
        self.maybe_optimize()?;
        Ok(Some(old_value))
    }

    fn next_slot(&mut self, rid: Rid, idx: usize) -> Result<Option<(Rid, usize)>, TreeError> {
        let count = self.cache.get(&rid).expect("present").count();
        if idx + 1 < count {
            return Ok(Some((rid, idx + 1)));
        }
        let right = self.node_right(rid)?;
        if !right.is_invalid() {
            let min = self.minimum_node(right)?;
            return Ok(Some((min, 0)));
        }
        let mut child = rid;
        let mut parent = self.node_parent(rid)?;
        while !parent.is_invalid() {
            if self.node_left(parent)? == child {
                return Ok(Some((parent, 0)));
            }
            child = parent;
            parent = self.node_parent(parent)?;
        }
        Ok(None)
    }

    fn prev_slot(&mut self, rid: Rid, idx: usize) -> Result<Option<(Rid, usize)>, TreeError> {
        if idx > 0 {
            return Ok(Some((rid, idx - 1)));
        }
        let left = self.node_left(rid)?;
        if !left.is_invalid() {
            let max = self.maximum_node(left)?;
            let count = self.cache.get(&max).expect("present").count();
            return Ok(Some((max, count - 1)));
        }
        let mut child = rid;
        let mut parent = self.node_parent(rid)?;
        while !parent.is_invalid() {
            if self.node_right(parent)? == child {
                let count = self.cache.get(&parent).expect("present").count();
                return Ok(Some((parent, count - 1)));
            }
            child = parent;
            parent = self.node_parent(parent)?;
        }
        Ok(None)
    }

    pub fn first(&mut self) -> Result<Option<(K, V)>, TreeError> {
        if self.descriptor.root_rid.is_invalid() {
            return Ok(None);
        }
        let rid = self.minimum_node(self.descriptor.root_rid)?;
        let node = self.cache.get_mut(&rid).expect("present");
        if node.is_empty() {
            return Ok(None);
        }
        Ok(Some((node.key_at(0)?.clone(), node.value_at(0)?.clone())))
    }

    pub fn last(&mut self) -> Result<Option<(K, V)>, TreeError> {
        if self.descriptor.root_rid.is_invalid() {
            return Ok(None);
        }
        let rid = self.maximum_node(self.descriptor.root_rid)?;
        let node = self.cache.get_mut(&rid).expect("present");
        if node.is_empty() {
            return Ok(None);
        }
        let last = node.count() - 1;
        Ok(Some((node.key_at(last)?.clone(), node.value_at(last)?.clone())))
    }

    pub fn successor(&mut self, key: &K) -> Result<Option<(K, V)>, TreeError> {
        if self.descriptor.root_rid.is_invalid() {
            return Ok(None);
        }
        let rid = self.locate_node(key)?;
        let idx = match self.cache.get_mut(&rid).expect("located").locate(key)? {
            Ok(idx) => idx,
            Err(_) => return Ok(None),
        };
        match self.next_slot(rid, idx)? {
            Some((nrid, nidx)) => {
                let node = self.cache.get_mut(&nrid).expect("present");
                Ok(Some((node.key_at(nidx)?.clone(), node.value_at(nidx)?.clone())))
            }
            None => Ok(None),
        }
    }

    pub fn predecessor(&mut self, key: &K) -> Result<Option<(K, V)>, TreeError> {
        if self.descriptor.root_rid.is_invalid() {
            return Ok(None);
        }
        let rid = self.locate_node(key)?;
        let idx = match self.cache.get_mut(&rid).expect("located").locate(key)? {
            Ok(idx) => idx,
            Err(_) => return Ok(None),
        };
        match self.prev_slot(rid, idx)? {
            Some((prid, pidx)) => {
                let node = self.cache.get_mut(&prid).expect("present");
                Ok(Some((node.key_at(pidx)?.clone(), node.value_at(pidx)?.clone())))
            }
            None => Ok(None),
        }
    }

    pub fn clear(&mut self) -> Result<(), TreeError> {
        let mut stack = vec![self.descriptor.root_rid];
        while let Some(rid) = stack.pop() {
            if rid.is_invalid() {
                continue;
            }
            self.ensure_loaded(rid)?;
            let (left, right) = {
                let node = self.cache.get(&rid).expect("loaded");
                (node.left_rid, node.right_rid)
            };
            stack.push(left);
            stack.push(right);
            if rid.is_persistent() {
                self.store.delete(rid).map_err(|e| TreeError::storage_io(rid, e))?;
            }
        }
        self.cache.clear();
        self.entry_points = EntryPoints::new(self.config.entry_points_size);
        self.commit.clear();
        self.descriptor.root_rid = Rid::INVALID;
        self.descriptor.size = 0;
        self.descriptor_dirty = true;
        self.usage_counter = 0;
        Ok(())
    }

    /// Step 1-4 of the commit drain loop (§4.4): snapshot the dirty set,
    /// write each page (recursing into still-provisional children first),
    /// and repeat until a pass produces no further dirty pages.
    pub fn flush(&mut self) -> Result<(), TreeError> {
        loop {
            let work = self.commit.drain_snapshot();
            if work.is_empty() {
                break;
            }
            for rid in work {
                self.write_one(rid)?;
            }
        }
        self.persist_descriptor()
    }

    fn write_one(&mut self, rid: Rid) -> Result<(), TreeError> {
        if !self.cache.contains(&rid) {
            return Ok(());
        }
        let (left, right) = {
            let node = self.cache.get(&rid).expect("present");
            (node.left_rid, node.right_rid)
        };
        if left.is_provisional() && self.cache.contains(&left) {
            self.write_one(left)?;
        }
        if right.is_provisional() && self.cache.contains(&right) {
            self.write_one(right)?;
        }

        let node = self.cache.get_mut(&rid).expect("present");
        let bytes = node.to_bytes();
        let provisional = rid.is_provisional();
        let final_rid = if provisional {
            self.store.create(self.cluster_id, bytes).map_err(|e| TreeError::storage_io(rid, e))?
        } else {
            self.store.update(rid, bytes).map_err(|e| TreeError::storage_io(rid, e))?;
            rid
        };

        if provisional {
            self.cache.rekey(rid, final_rid);
            let parent_rid = self.cache.get(&final_rid).expect("present").parent_rid;
            if !parent_rid.is_invalid() && self.cache.contains(&parent_rid) {
                let parent = self.cache.get_mut(&parent_rid).expect("present");
                let mut changed = false;
                if parent.left_rid == rid {
                    parent.left_rid = final_rid;
                    changed = true;
                }
                if parent.right_rid == rid {
                    parent.right_rid = final_rid;
                    changed = true;
                }
                if changed {
                    parent.dirty = true;
                    self.commit.mark(parent_rid);
                }
            }
            let (child_left, child_right) = {
                let node = self.cache.get(&final_rid).expect("present");
                (node.left_rid, node.right_rid)
            };
            for child in [child_left, child_right] {
                if !child.is_invalid() && self.cache.contains(&child) {
                    let c = self.cache.get_mut(&child).expect("present");
                    if c.parent_rid == rid {
                        c.parent_rid = final_rid;
                        c.dirty = true;
                        self.commit.mark(child);
                    }
                }
            }
            if self.descriptor.root_rid == rid {
                self.descriptor.root_rid = final_rid;
                self.descriptor_dirty = true;
            }
            if self.entry_points.contains(rid) {
                self.entry_points.remove(rid);
                let first_key = self.cache.get_mut(&final_rid).expect("present").first_key()?.cloned();
                if let Some(first_key) = first_key {
                    self.entry_points.consider_promote(final_rid, first_key);
                }
            }
        }
        Ok(())
    }

    fn persist_descriptor(&mut self) -> Result<(), TreeError> {
        if !self.descriptor_dirty {
            return Ok(());
        }
        let bytes = self.descriptor.to_bytes();
        self.store
            .update(self.descriptor_rid, bytes)
            .map_err(|e| TreeError::storage_io(self.descriptor_rid, e))?;
        self.descriptor_dirty = false;
        Ok(())
    }

    /// Rekeys any cache entry still addressed by a provisional RID to its
    /// post-commit final RID. Called from the post-commit lifecycle hook;
    /// `flush` already performs this rekeying inline, so in ordinary use
    /// this is a no-op safety net for anything flush's recursion missed.
    pub fn rekey_after_commit(&mut self) {
        let stale: Vec<Rid> = self
            .cache
            .dirty_rids()
            .into_iter()
            .filter(|rid| rid.is_provisional())
            .collect();
        debug_assert!(stale.is_empty(), "flush should have resolved every provisional rid");
    }

    /// Reloads tree state from the stored root, discarding everything the
    /// in-memory cache/entry points/commit buffer believed.
    pub fn reload_from_root(&mut self) -> Result<(), TreeError> {
        self.cache.clear();
        self.entry_points = EntryPoints::new(self.config.entry_points_size);
        self.commit.clear();
        let bytes = self
            .store
            .read(self.descriptor_rid)
            .map_err(|e| TreeError::storage_io(self.descriptor_rid, e))?;
        self.descriptor = TreeDescriptor::from_bytes(&bytes)?;
        self.descriptor_dirty = false;
        Ok(())
    }

    fn max_in_memory_depth(&self, rid: Rid, depth: usize) -> usize {
        if rid.is_invalid() || !self.cache.contains(&rid) {
            return depth;
        }
        let node = self.cache.get(&rid).expect("present");
        let left_depth = self.max_in_memory_depth(node.left_rid, depth + 1);
        let right_depth = self.max_in_memory_depth(node.right_rid, depth + 1);
        left_depth.max(right_depth).max(depth)
    }

    fn evict_deep(&mut self, rid: Rid, depth: usize, threshold: usize, entry_rids: &HashSet<Rid>) {
        if rid.is_invalid() || !self.cache.contains(&rid) {
            return;
        }
        let (left, right, dirty) = {
            let node = self.cache.get(&rid).expect("present");
            (node.left_rid, node.right_rid, node.dirty)
        };
        self.evict_deep(left, depth + 1, threshold, entry_rids);
        self.evict_deep(right, depth + 1, threshold, entry_rids);
        if depth >= threshold && !dirty && !entry_rids.contains(&rid) && rid != self.descriptor.root_rid {
            self.cache.remove(&rid);
        }
    }

    /// The eviction pass (§4.3): prunes cold, non-dirty, non-entry-point
    /// pages from the cache once the in-memory depth exceeds
    /// `entry_points_size * optimize_entrypoints_factor`.
    pub fn optimize(&mut self) -> Result<(), TreeError> {
        if self.descriptor.root_rid.is_invalid() {
            self.usage_counter = 0;
            return Ok(());
        }
        let threshold =
            ((self.config.entry_points_size as f64) * self.config.optimize_entrypoints_factor).ceil() as usize;
        let threshold = threshold.max(1);
        let max_depth = self.max_in_memory_depth(self.descriptor.root_rid, 0);
        if max_depth < threshold {
            self.usage_counter = 0;
            return Ok(());
        }
        let entry_rids: HashSet<Rid> = self.entry_points.rids().into_iter().collect();
        self.evict_deep(self.descriptor.root_rid, 0, threshold, &entry_rids);
        self.entry_points.age_and_demote();
        self.usage_counter = 0;
        debug!(cache_len = self.cache.len(), "optimize pass complete");
        Ok(())
    }
}
