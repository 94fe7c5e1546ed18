//! Lazy materialization for a single key or value inside a `NodePage`.
//!
//! A page read from disk starts every slot as `Encoded` — raw bytes, not
//! yet worth the decode cost until something actually asks for the typed
//! value. Once decoded it's cached alongside the original bytes (`Both`) so
//! re-encoding an unmodified slot on the next flush doesn't redo the work.

#[derive(Debug, Clone)]
pub enum Slot<T> {
    Encoded(Vec<u8>),
    Decoded(T),
    Both(T, Vec<u8>),
}

impl<T> Slot<T> {
    pub fn encoded(bytes: Vec<u8>) -> Self {
        Slot::Encoded(bytes)
    }

    pub fn decoded(value: T) -> Self {
        Slot::Decoded(value)
    }

    /// Returns the cached encoded bytes, if any, without decoding.
    pub fn encoded_bytes(&self) -> Option<&[u8]> {
        match self {
            Slot::Encoded(bytes) | Slot::Both(_, bytes) => Some(bytes),
            Slot::Decoded(_) => None,
        }
    }

    /// Returns the cached decoded value, if any, without decoding.
    pub fn decoded_value(&self) -> Option<&T> {
        match self {
            Slot::Decoded(value) | Slot::Both(value, _) => Some(value),
            Slot::Encoded(_) => None,
        }
    }

    /// Materializes the typed value, decoding and caching the result if
    /// this slot hasn't been decoded yet.
    pub fn materialize<E>(
        &mut self,
        decode: impl FnOnce(&[u8]) -> Result<T, E>,
    ) -> Result<&T, E> {
        if let Slot::Encoded(bytes) = self {
            let value = decode(bytes)?;
            let bytes = std::mem::take(bytes);
            *self = Slot::Both(value, bytes);
        }
        Ok(self.decoded_value().expect("just materialized"))
    }

    /// Replaces the decoded value, invalidating any cached encoding.
    pub fn set_decoded(&mut self, value: T) {
        *self = Slot::Decoded(value);
    }

    /// Produces the encoded bytes, encoding and caching the result if this
    /// slot has never been encoded (or was replaced since).
    pub fn encode(&mut self, encode: impl FnOnce(&T) -> Vec<u8>) -> &[u8] {
        if let Slot::Decoded(value) = self {
            let bytes = encode(value);
            let value = match std::mem::replace(self, Slot::Encoded(Vec::new())) {
                Slot::Decoded(value) => value,
                _ => unreachable!(),
            };
            *self = Slot::Both(value, bytes);
        }
        self.encoded_bytes().expect("just encoded")
    }

    pub fn into_decoded<E>(
        self,
        decode: impl FnOnce(&[u8]) -> Result<T, E>,
    ) -> Result<T, E> {
        match self {
            Slot::Decoded(value) | Slot::Both(value, _) => Ok(value),
            Slot::Encoded(bytes) => decode(&bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_caches_decoded_value() {
        let mut slot: Slot<i64> = Slot::encoded(vec![1, 0, 0, 0, 0, 0, 0, 0]);
        let decode = |bytes: &[u8]| -> Result<i64, ()> {
            Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
        };
        assert_eq!(*slot.materialize(decode).unwrap(), 1);
        assert!(matches!(slot, Slot::Both(1, _)));
    }

    #[test]
    fn encode_caches_bytes_for_decoded_slot() {
        let mut slot: Slot<i64> = Slot::decoded(42);
        let bytes = slot.encode(|v| v.to_le_bytes().to_vec()).to_vec();
        assert_eq!(bytes, 42i64.to_le_bytes());
        assert!(matches!(slot, Slot::Both(42, _)));
    }

    #[test]
    fn set_decoded_drops_stale_encoding() {
        let mut slot: Slot<i64> = Slot::encoded(vec![9; 8]);
        slot.set_decoded(7);
        assert!(slot.encoded_bytes().is_none());
        assert_eq!(*slot.decoded_value().unwrap(), 7);
    }
}
