//! Storage-engine selection: turns a connection URL (`memory:` or
//! `plocal:<path>`) into the `RecordStore` every table's rows and every
//! index's tree persist through.
//!
//! This replaces the teacher's single hardcoded `rustql_data.json` path
//! and its unwired, 4096-byte-page `BTreeStorageEngine` sketch — the real
//! paged tree in `crate::tree` now does what that sketch only gestured at.

use crate::config::{StorageUrl, StorageUrlError};
use crate::store::{FileRecordStore, MemoryRecordStore, RecordStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageEngineError {
    #[error(transparent)]
    Url(#[from] StorageUrlError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Something that can open the `RecordStore` behind a storage URL scheme.
/// Each scheme (`memory:`, `plocal:`) gets its own engine; `engine_for_url`
/// is the dispatcher a caller actually goes through.
pub trait StorageEngine: Send + Sync {
    fn open(&self) -> Result<Arc<dyn RecordStore>, StorageEngineError>;
}

/// `memory:` — a fresh, empty, non-durable store. What tests and
/// throwaway sessions use.
pub struct MemoryStorageEngine;

impl StorageEngine for MemoryStorageEngine {
    fn open(&self) -> Result<Arc<dyn RecordStore>, StorageEngineError> {
        Ok(Arc::new(MemoryRecordStore::new()))
    }
}

/// `plocal:<path>` — a durable append-log file, opened or created at
/// `path`.
pub struct PlocalStorageEngine {
    path: String,
}

impl PlocalStorageEngine {
    pub fn new(path: impl Into<String>) -> Self {
        PlocalStorageEngine { path: path.into() }
    }
}

impl StorageEngine for PlocalStorageEngine {
    fn open(&self) -> Result<Arc<dyn RecordStore>, StorageEngineError> {
        Ok(Arc::new(FileRecordStore::open(&self.path)?))
    }
}

/// Parses `url` and returns the engine registered for its scheme.
pub fn engine_for_url(url: &str) -> Result<Box<dyn StorageEngine>, StorageEngineError> {
    match StorageUrl::parse(url)? {
        StorageUrl::Memory => Ok(Box::new(MemoryStorageEngine)),
        StorageUrl::Local(path) => Ok(Box::new(PlocalStorageEngine::new(path))),
    }
}

/// Convenience wrapper: parse and open in one call.
pub fn open_store(url: &str) -> Result<Arc<dyn RecordStore>, StorageEngineError> {
    engine_for_url(url)?.open()
}
