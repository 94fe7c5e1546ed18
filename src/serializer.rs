//! Named codecs for tree keys and values. Each `TreeDescriptor` records the
//! serializer name it was built with so a reopened tree can verify the
//! caller is using a compatible codec before trusting old bytes.

use crate::ast::Value;
use crate::rid::Rid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("invalid utf-8 in string value: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("truncated blob while decoding {0}")]
    Truncated(&'static str),
}

/// Encodes and decodes a single type to/from its on-disk byte form.
pub trait Codec: Sized {
    const NAME: &'static str;
    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self, SerializerError>;
}

impl Codec for i64 {
    const NAME: &'static str = "i64";

    fn encode(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializerError> {
        let array: [u8; 8] = bytes
            .try_into()
            .map_err(|_| SerializerError::WrongLength { expected: 8, actual: bytes.len() })?;
        Ok(i64::from_be_bytes(array))
    }
}

impl Codec for f64 {
    const NAME: &'static str = "f64";

    fn encode(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializerError> {
        let array: [u8; 8] = bytes
            .try_into()
            .map_err(|_| SerializerError::WrongLength { expected: 8, actual: bytes.len() })?;
        Ok(f64::from_be_bytes(array))
    }
}

impl Codec for String {
    const NAME: &'static str = "string";

    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializerError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

impl Codec for Rid {
    const NAME: &'static str = "rid";

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Rid::TIGHT_LEN);
        self.write_tight(&mut out);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializerError> {
        Rid::read_tight(bytes)
            .map(|(rid, _)| rid)
            .ok_or(SerializerError::Truncated("Rid"))
    }
}

/// A posting list of RIDs, the value type used by non-unique indexes.
impl Codec for Vec<Rid> {
    const NAME: &'static str = "rid_list";

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * Rid::TIGHT_LEN);
        for rid in self {
            rid.write_tight(&mut out);
        }
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializerError> {
        let mut rids = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (rid, tail) = Rid::read_tight(rest).ok_or(SerializerError::Truncated("Vec<Rid>"))?;
            rids.push(rid);
            rest = tail;
        }
        Ok(rids)
    }
}

/// Column values used as index keys. Encoded as JSON rather than a custom
/// binary form since every variant already derives `serde::Serialize` for
/// catalog persistence — one encoding to keep in sync instead of two.
impl Codec for Value {
    const NAME: &'static str = "sql_value";

    fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Value always serializes")
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializerError> {
        serde_json::from_slice(bytes).map_err(|_| SerializerError::Truncated("Value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_round_trips_negative_values() {
        let bytes = (-42i64).encode();
        assert_eq!(i64::decode(&bytes).unwrap(), -42);
    }

    #[test]
    fn string_round_trips() {
        let bytes = "hello world".to_string().encode();
        assert_eq!(String::decode(&bytes).unwrap(), "hello world");
    }

    #[test]
    fn rid_list_round_trips_several_entries() {
        let rids = vec![Rid::new(0, 1), Rid::new(0, 2), Rid::new(1, 0)];
        let bytes = rids.encode();
        assert_eq!(Vec::<Rid>::decode(&bytes).unwrap(), rids);
    }

    #[test]
    fn value_round_trips_each_variant() {
        for value in [Value::Null, Value::Integer(7), Value::Float(1.5), Value::Text("hi".to_string()), Value::Boolean(true)] {
            let bytes = value.encode();
            assert_eq!(Value::decode(&bytes).unwrap(), value);
        }
    }
}
