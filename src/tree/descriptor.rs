//! The tree's persistent root record: everything needed to reopen a tree
//! from nothing but its descriptor RID.

use crate::rid::Rid;
use crate::tree::error::TreeError;
use crate::tree::varint::{read_varint, write_varint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDescriptor {
    pub root_rid: Rid,
    pub size: i64,
    pub last_page_size: u16,
    pub key_serializer_name: String,
    pub value_serializer_name: String,
}

impl TreeDescriptor {
    pub fn new(page_size: u16, key_serializer_name: &str, value_serializer_name: &str) -> Self {
        TreeDescriptor {
            root_rid: Rid::INVALID,
            size: 0,
            last_page_size: page_size,
            key_serializer_name: key_serializer_name.to_string(),
            value_serializer_name: value_serializer_name.to_string(),
        }
    }

    /// Widened to a full `i64` on disk rather than the legacy 32-bit field
    /// (see DESIGN.md Open Question #3) — nothing in this codebase ever
    /// wrote the 32-bit layout, so there's no bit-compat format to keep.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.root_rid.write_tight(&mut out);
        out.extend_from_slice(&self.size.to_be_bytes());
        out.extend_from_slice(&self.last_page_size.to_be_bytes());
        write_varint(self.key_serializer_name.len() as u64, &mut out);
        out.extend_from_slice(self.key_serializer_name.as_bytes());
        write_varint(self.value_serializer_name.len() as u64, &mut out);
        out.extend_from_slice(self.value_serializer_name.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TreeError> {
        let err = || TreeError::corruption(Rid::INVALID, "truncated tree descriptor");
        let (root_rid, _) = Rid::read_tight(bytes).ok_or_else(err)?;
        let mut cursor = Rid::TIGHT_LEN;
        let size = i64::from_be_bytes(
            bytes
                .get(cursor..cursor + 8)
                .ok_or_else(err)?
                .try_into()
                .map_err(|_| err())?,
        );
        cursor += 8;
        let last_page_size = u16::from_be_bytes(
            bytes
                .get(cursor..cursor + 2)
                .ok_or_else(err)?
                .try_into()
                .map_err(|_| err())?,
        );
        cursor += 2;

        let key_len = read_varint(bytes, &mut cursor).map_err(|_| err())? as usize;
        let key_serializer_name =
            String::from_utf8(bytes.get(cursor..cursor + key_len).ok_or_else(err)?.to_vec())
                .map_err(|_| err())?;
        cursor += key_len;

        let value_len = read_varint(bytes, &mut cursor).map_err(|_| err())? as usize;
        let value_serializer_name =
            String::from_utf8(bytes.get(cursor..cursor + value_len).ok_or_else(err)?.to_vec())
                .map_err(|_| err())?;

        Ok(TreeDescriptor { root_rid, size, last_page_size, key_serializer_name, value_serializer_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_empty_root() {
        let descriptor = TreeDescriptor::new(1024, "i64", "rid");
        let bytes = descriptor.to_bytes();
        assert_eq!(TreeDescriptor::from_bytes(&bytes).unwrap(), descriptor);
    }

    #[test]
    fn round_trips_with_large_size() {
        let mut descriptor = TreeDescriptor::new(64, "string", "rid_list");
        descriptor.root_rid = Rid::new(3, 4_000_000_000);
        descriptor.size = 9_000_000_000;
        let bytes = descriptor.to_bytes();
        assert_eq!(TreeDescriptor::from_bytes(&bytes).unwrap(), descriptor);
    }
}
