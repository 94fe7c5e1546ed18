//! The record store: the external collaborator the tree core persists
//! NodePages and rows through. Contract only needs create/update/read/delete
//! with final-RID assignment on `create` (SPEC_FULL §6).

use crate::rid::Rid;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(Rid),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record store state: {0}")]
    Invalid(String),
}

/// Version-bumped write contract: persists opaque byte blobs keyed by RID.
pub trait RecordStore: Send + Sync {
    /// Assigns a final RID and stores `bytes` under it.
    fn create(&self, cluster_id: i32, bytes: Vec<u8>) -> Result<Rid, StoreError>;
    /// Overwrites the record at `rid`, returning the bumped version number.
    /// Idempotent under unchanged bytes: writing the same content twice
    /// does not advance the version a second time.
    fn update(&self, rid: Rid, bytes: Vec<u8>) -> Result<u32, StoreError>;
    fn read(&self, rid: Rid) -> Result<Vec<u8>, StoreError>;
    fn delete(&self, rid: Rid) -> Result<(), StoreError>;
}

struct Record {
    bytes: Vec<u8>,
    version: u32,
}

/// In-memory record store used by `memory:` storage URLs and by tests.
/// Each cluster gets its own monotonically increasing position counter.
pub struct MemoryRecordStore {
    clusters: Mutex<HashMap<i32, HashMap<i64, Record>>>,
    next_position: Mutex<HashMap<i32, i64>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        MemoryRecordStore {
            clusters: Mutex::new(HashMap::new()),
            next_position: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, cluster_id: i32, bytes: Vec<u8>) -> Result<Rid, StoreError> {
        let mut positions = self.next_position.lock().unwrap();
        let position = positions.entry(cluster_id).or_insert(0);
        let rid = Rid::new(cluster_id, *position);
        *position += 1;
        let mut clusters = self.clusters.lock().unwrap();
        clusters
            .entry(cluster_id)
            .or_default()
            .insert(rid.cluster_position, Record { bytes, version: 0 });
        Ok(rid)
    }

    fn update(&self, rid: Rid, bytes: Vec<u8>) -> Result<u32, StoreError> {
        let mut clusters = self.clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&rid.cluster_id)
            .ok_or(StoreError::NotFound(rid))?;
        let record = cluster
            .get_mut(&rid.cluster_position)
            .ok_or(StoreError::NotFound(rid))?;
        if record.bytes != bytes {
            record.bytes = bytes;
            record.version += 1;
        }
        Ok(record.version)
    }

    fn read(&self, rid: Rid) -> Result<Vec<u8>, StoreError> {
        let clusters = self.clusters.lock().unwrap();
        clusters
            .get(&rid.cluster_id)
            .and_then(|c| c.get(&rid.cluster_position))
            .map(|r| r.bytes.clone())
            .ok_or(StoreError::NotFound(rid))
    }

    fn delete(&self, rid: Rid) -> Result<(), StoreError> {
        let mut clusters = self.clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&rid.cluster_id)
            .ok_or(StoreError::NotFound(rid))?;
        cluster.remove(&rid.cluster_position).ok_or(StoreError::NotFound(rid))?;
        Ok(())
    }
}

/// File-backed record store for `plocal:<path>` URLs.
///
/// Layout: an 8 byte magic header (`b"VTXDB01\0"`) followed by a flat
/// sequence of framed records, each `[cluster_id: i32][position: i64][len:
/// u32][tombstone: u8][bytes]`. A free position list per cluster lets
/// `delete` punch a hole that a later `create` can't accidentally reuse
/// (positions are never recycled — recycling would break outstanding RIDs
/// held in NodePage links). The whole file is re-scanned on open to build
/// the in-memory offset index; this keeps the format simple at the cost of
/// open-time latency, acceptable for the single-writer discipline in §5.
pub struct FileRecordStore {
    path: PathBuf,
    file: Mutex<File>,
    index: RwLock<HashMap<(i32, i64), u64>>,
    next_position: Mutex<HashMap<i32, i64>>,
}

const MAGIC: &[u8; 8] = b"VTXDB01\0";

impl FileRecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let exists = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if !exists {
            file.write_all(MAGIC)?;
            file.flush()?;
        }

        let store = FileRecordStore {
            path,
            file: Mutex::new(file),
            index: RwLock::new(HashMap::new()),
            next_position: Mutex::new(HashMap::new()),
        };
        store.rebuild_index()?;
        Ok(store)
    }

    fn rebuild_index(&self) -> Result<(), StoreError> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; 8];
        if file.read_exact(&mut header).is_err() || &header != MAGIC {
            return Err(StoreError::Invalid(format!(
                "{} is not a vertexdb record store file",
                self.path.display()
            )));
        }

        let mut index = self.index.write().unwrap();
        let mut next_position = self.next_position.lock().unwrap();
        let mut offset = 8u64;
        loop {
            let frame_start = offset;
            let mut frame_header = [0u8; 17];
            match file.read_exact(&mut frame_header) {
                Ok(()) => {}
                Err(_) => break,
            }
            let cluster_id = i32::from_be_bytes(frame_header[0..4].try_into().unwrap());
            let position = i64::from_be_bytes(frame_header[4..12].try_into().unwrap());
            let len = u32::from_be_bytes(frame_header[12..16].try_into().unwrap());
            let tombstone = frame_header[16];
            offset = frame_start + 17 + len as u64;
            file.seek(SeekFrom::Start(offset))?;

            let slot = next_position.entry(cluster_id).or_insert(0);
            if position >= *slot {
                *slot = position + 1;
            }
            if tombstone == 0 {
                index.insert((cluster_id, position), frame_start);
            } else {
                index.remove(&(cluster_id, position));
            }
        }
        Ok(())
    }

    fn append_frame(
        &self,
        cluster_id: i32,
        position: i64,
        bytes: &[u8],
        tombstone: u8,
    ) -> Result<u64, StoreError> {
        let mut file = self.file.lock().unwrap();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(&cluster_id.to_be_bytes())?;
        file.write_all(&position.to_be_bytes())?;
        file.write_all(&(bytes.len() as u32).to_be_bytes())?;
        file.write_all(&[tombstone])?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(offset)
    }

    fn read_frame_bytes(&self, offset: u64) -> Result<Vec<u8>, StoreError> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))?;
        let mut frame_header = [0u8; 17];
        file.read_exact(&mut frame_header)?;
        let len = u32::from_be_bytes(frame_header[12..16].try_into().unwrap()) as usize;
        let mut bytes = vec![0u8; len];
        file.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

impl RecordStore for FileRecordStore {
    fn create(&self, cluster_id: i32, bytes: Vec<u8>) -> Result<Rid, StoreError> {
        let position = {
            let mut next_position = self.next_position.lock().unwrap();
            let slot = next_position.entry(cluster_id).or_insert(0);
            let position = *slot;
            *slot += 1;
            position
        };
        let offset = self.append_frame(cluster_id, position, &bytes, 0)?;
        self.index.write().unwrap().insert((cluster_id, position), offset);
        Ok(Rid::new(cluster_id, position))
    }

    fn update(&self, rid: Rid, bytes: Vec<u8>) -> Result<u32, StoreError> {
        let key = (rid.cluster_id, rid.cluster_position);
        let existing_offset = *self
            .index
            .read()
            .unwrap()
            .get(&key)
            .ok_or(StoreError::NotFound(rid))?;
        if self.read_frame_bytes(existing_offset)? == bytes {
            return Ok(0);
        }
        let offset = self.append_frame(rid.cluster_id, rid.cluster_position, &bytes, 0)?;
        self.index.write().unwrap().insert(key, offset);
        Ok(1)
    }

    fn read(&self, rid: Rid) -> Result<Vec<u8>, StoreError> {
        let key = (rid.cluster_id, rid.cluster_position);
        let offset = *self.index.read().unwrap().get(&key).ok_or(StoreError::NotFound(rid))?;
        self.read_frame_bytes(offset)
    }

    fn delete(&self, rid: Rid) -> Result<(), StoreError> {
        let key = (rid.cluster_id, rid.cluster_position);
        if self.index.read().unwrap().get(&key).is_none() {
            return Err(StoreError::NotFound(rid));
        }
        self.append_frame(rid.cluster_id, rid.cluster_position, &[], 1)?;
        self.index.write().unwrap().remove(&key);
        Ok(())
    }
}

/// Allocates cluster ids within a single record store, analogous to the
/// real database's cluster registry (one cluster per table/index).
pub struct ClusterRegistry {
    next_cluster_id: AtomicI64,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        ClusterRegistry { next_cluster_id: AtomicI64::new(0) }
    }

    pub fn allocate(&self) -> i32 {
        self.next_cluster_id.fetch_add(1, Ordering::SeqCst) as i32
    }
}

impl Default for ClusterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
