use crate::rid::Rid;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("corruption at {rid}: {detail}")]
    Corruption { rid: Rid, detail: String },

    #[error("serialization failure at {rid}: {detail}")]
    Serialization { rid: Rid, detail: String },

    #[error("storage io failure at {rid}: {source}")]
    StorageIo { rid: Rid, #[source] source: StoreError },

    #[error("unique index violation: key already maps to {existing}")]
    UniqueViolation { existing: Rid },

    #[error("index {index} out of range (count {count})")]
    OutOfRange { index: usize, count: usize },
}

impl TreeError {
    /// Recoverable errors can be surfaced to the caller as an ordinary
    /// failed operation; everything else means the tree's on-disk or
    /// in-memory invariants can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TreeError::UniqueViolation { .. } | TreeError::OutOfRange { .. })
    }

    pub fn corruption(rid: Rid, detail: impl Into<String>) -> Self {
        TreeError::Corruption { rid, detail: detail.into() }
    }

    pub fn serialization(rid: Rid, detail: impl Into<String>) -> Self {
        TreeError::Serialization { rid, detail: detail.into() }
    }

    pub fn storage_io(rid: Rid, source: StoreError) -> Self {
        TreeError::StorageIo { rid, source }
    }
}
