//! The persistent red-black tree node. Packs up to `page_size` key/value
//! slots plus parent/left/right links, and is the unit of I/O between the
//! tree engine and the record store.

use crate::rid::Rid;
use crate::serializer::Codec;
use crate::tree::error::TreeError;
use crate::tree::slot::Slot;
use crate::tree::varint::{read_varint, write_varint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

impl Color {
    fn to_byte(self) -> u8 {
        match self {
            Color::Red => 1,
            Color::Black => 0,
        }
    }

    fn from_byte(byte: u8) -> Color {
        if byte == 1 {
            Color::Red
        } else {
            Color::Black
        }
    }
}

/// Fixed header length per the wire layout: page_size(2) + parent(10) +
/// left(10) + right(10) + color(1) + count(2).
pub const HEADER_LEN: usize = 2 + 10 + 10 + 10 + 1 + 2;

#[derive(Debug, Clone)]
pub struct NodePage<K, V> {
    pub self_rid: Rid,
    pub parent_rid: Rid,
    pub left_rid: Rid,
    pub right_rid: Rid,
    pub color: Color,
    pub page_size: u16,
    keys: Vec<Slot<K>>,
    values: Vec<Slot<V>>,
    pub dirty: bool,
}

impl<K: Codec, V: Codec> NodePage<K, V> {
    pub fn new(self_rid: Rid, page_size: u16, color: Color) -> Self {
        NodePage {
            self_rid,
            parent_rid: Rid::INVALID,
            left_rid: Rid::INVALID,
            right_rid: Rid::INVALID,
            color,
            page_size,
            keys: Vec::new(),
            values: Vec::new(),
            dirty: true,
        }
    }

    pub fn count(&self) -> usize {
        self.keys.len()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.page_size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_at(&mut self, index: usize) -> Result<&K, TreeError> {
        let rid = self.self_rid;
        self.keys
            .get_mut(index)
            .ok_or(TreeError::OutOfRange { index, count: self.keys.len() })?
            .materialize(|bytes| {
                K::decode(bytes).map_err(|e| TreeError::serialization(rid, e.to_string()))
            })
    }

    pub fn value_at(&mut self, index: usize) -> Result<&V, TreeError> {
        let rid = self.self_rid;
        self.values
            .get_mut(index)
            .ok_or(TreeError::OutOfRange { index, count: self.values.len() })?
            .materialize(|bytes| {
                V::decode(bytes).map_err(|e| TreeError::serialization(rid, e.to_string()))
            })
    }

    /// Sets `values[index] := v`, invalidating any cached encoding.
    pub fn set_value(&mut self, index: usize, value: V) -> Result<(), TreeError> {
        let count = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(TreeError::OutOfRange { index, count })?;
        slot.set_decoded(value);
        self.dirty = true;
        Ok(())
    }

    pub fn insert_slot_at(&mut self, index: usize, key: K, value: V) {
        self.keys.insert(index, Slot::decoded(key));
        self.values.insert(index, Slot::decoded(value));
        self.dirty = true;
    }

    pub fn remove_slot_at(&mut self, index: usize) -> Result<(K, V), TreeError> {
        if index >= self.keys.len() {
            return Err(TreeError::OutOfRange { index, count: self.keys.len() });
        }
        let rid = self.self_rid;
        let key_slot = self.keys.remove(index);
        let value_slot = self.values.remove(index);
        self.dirty = true;
        let key = key_slot
            .into_decoded(|b| K::decode(b).map_err(|e| TreeError::serialization(rid, e.to_string())))?;
        let value = value_slot
            .into_decoded(|b| V::decode(b).map_err(|e| TreeError::serialization(rid, e.to_string())))?;
        Ok((key, value))
    }

    /// Splits off the slots from `at` onward into a fresh vector pair,
    /// leaving `self` holding only the slots before `at`.
    pub fn split_off_tail(&mut self, at: usize) -> (Vec<Slot<K>>, Vec<Slot<V>>) {
        self.dirty = true;
        (self.keys.split_off(at), self.values.split_off(at))
    }

    pub fn extend_from_slots(&mut self, keys: Vec<Slot<K>>, values: Vec<Slot<V>>) {
        self.keys.extend(keys);
        self.values.extend(values);
        self.dirty = true;
    }

    /// Takes every slot out of this node, leaving it empty. Used by split,
    /// which tears an overflowing node down to its median and rebuilds two
    /// fresh children from the rest.
    pub fn take_all_slots(&mut self) -> (Vec<Slot<K>>, Vec<Slot<V>>) {
        self.dirty = true;
        (std::mem::take(&mut self.keys), std::mem::take(&mut self.values))
    }

    /// Replaces this node's slots wholesale, discarding whatever was there.
    pub fn restore_slots(&mut self, keys: Vec<Slot<K>>, values: Vec<Slot<V>>) {
        self.keys = keys;
        self.values = values;
        self.dirty = true;
    }

    /// Finds the slot index where `key` resides, or the insertion point
    /// `Err(i)` where it would go, by materializing keys left-to-right.
    /// `page_size` is small in practice (tens of entries) so a linear scan
    /// outperforms the bookkeeping a binary search over lazily-decoded
    /// slots would need.
    pub fn locate(&mut self, key: &K) -> Result<Result<usize, usize>, TreeError>
    where
        K: Ord,
    {
        for i in 0..self.keys.len() {
            let existing = self.key_at(i)?;
            match existing.cmp(key) {
                std::cmp::Ordering::Equal => return Ok(Ok(i)),
                std::cmp::Ordering::Greater => return Ok(Err(i)),
                std::cmp::Ordering::Less => continue,
            }
        }
        Ok(Err(self.keys.len()))
    }

    pub fn first_key(&mut self) -> Result<Option<&K>, TreeError> {
        if self.keys.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.key_at(0)?))
        }
    }

    pub fn last_key(&mut self) -> Result<Option<&K>, TreeError> {
        if self.keys.is_empty() {
            Ok(None)
        } else {
            let last = self.keys.len() - 1;
            Ok(Some(self.key_at(last)?))
        }
    }

    pub fn to_bytes(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.count() * 16);
        out.extend_from_slice(&self.page_size.to_be_bytes());
        self.parent_rid.write_tight(&mut out);
        self.left_rid.write_tight(&mut out);
        self.right_rid.write_tight(&mut out);
        out.push(self.color.to_byte());
        out.extend_from_slice(&(self.count() as u16).to_be_bytes());

        for slot in &mut self.keys {
            let bytes = slot.encode(|k| k.encode()).to_vec();
            write_varint(bytes.len() as u64, &mut out);
            out.extend_from_slice(&bytes);
        }
        for slot in &mut self.values {
            let bytes = slot.encode(|v| v.encode()).to_vec();
            write_varint(bytes.len() as u64, &mut out);
            out.extend_from_slice(&bytes);
        }
        self.dirty = false;
        out
    }

    pub fn from_bytes(self_rid: Rid, bytes: &[u8]) -> Result<Self, TreeError> {
        if bytes.len() < HEADER_LEN {
            return Err(TreeError::corruption(self_rid, "page shorter than fixed header"));
        }
        let page_size = u16::from_be_bytes(bytes[0..2].try_into().unwrap());
        let mut cursor = 2;
        let (parent_rid, _) = Rid::read_tight(&bytes[cursor..])
            .ok_or_else(|| TreeError::corruption(self_rid, "truncated parent_rid"))?;
        cursor += Rid::TIGHT_LEN;
        let (left_rid, _) = Rid::read_tight(&bytes[cursor..])
            .ok_or_else(|| TreeError::corruption(self_rid, "truncated left_rid"))?;
        cursor += Rid::TIGHT_LEN;
        let (right_rid, _) = Rid::read_tight(&bytes[cursor..])
            .ok_or_else(|| TreeError::corruption(self_rid, "truncated right_rid"))?;
        cursor += Rid::TIGHT_LEN;
        let color = Color::from_byte(bytes[cursor]);
        cursor += 1;
        let count = u16::from_be_bytes(
            bytes[cursor..cursor + 2]
                .try_into()
                .map_err(|_| TreeError::corruption(self_rid, "truncated count"))?,
        ) as usize;
        cursor += 2;

        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let len = read_varint(bytes, &mut cursor)
                .map_err(|e| TreeError::corruption(self_rid, e.to_string()))? as usize;
            let blob = bytes
                .get(cursor..cursor + len)
                .ok_or_else(|| TreeError::corruption(self_rid, "truncated key blob"))?
                .to_vec();
            cursor += len;
            keys.push(Slot::encoded(blob));
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let len = read_varint(bytes, &mut cursor)
                .map_err(|e| TreeError::corruption(self_rid, e.to_string()))? as usize;
            let blob = bytes
                .get(cursor..cursor + len)
                .ok_or_else(|| TreeError::corruption(self_rid, "truncated value blob"))?
                .to_vec();
            cursor += len;
            values.push(Slot::encoded(blob));
        }

        Ok(NodePage {
            self_rid,
            parent_rid,
            left_rid,
            right_rid,
            color,
            page_size,
            keys,
            values,
            dirty: false,
        })
    }
}
