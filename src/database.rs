//! Schema metadata: tables, their columns, and the indexes each table
//! owns. Row data lives directly on `Table` (the teacher's own in-memory
//! model, kept — §1 calls schema metadata routine glue, not the hard
//! part). Indexes are the hard part, and are backed by a real persistent
//! `Tree` through `IndexFacade`.
//!
//! A row's `Rid` is `(table.data_cluster, position in Table::rows)` —
//! positions are never reused (a deleted row leaves a `None` tombstone),
//! matching the append-only-position discipline `FileRecordStore` already
//! uses for its own records.

use crate::ast::{ColumnDefinition, IndexKind, Value};
use crate::config::TreeConfig;
use crate::index::{tokenize, IndexError, IndexFacade, IndexFlavor};
use crate::rid::Rid;
use crate::store::{ClusterRegistry, RecordStore};
use crate::txn::TxEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A key an `IndexEntry` actually indexes on: every flavor except
/// full-text stores the column's `Value` directly; full-text fixes its
/// key type to the tokenized `String`, so it needs its own facade type.
enum IndexHandle {
    Value(IndexFacade<Value>),
    Text(IndexFacade<String>),
}

impl IndexHandle {
    fn create(name: &str, flavor: IndexFlavor, store: Arc<dyn RecordStore>, cluster_id: i32) -> Result<Self, IndexError> {
        let config = TreeConfig { max_updates_before_save: 0, ..TreeConfig::default() };
        match flavor {
            IndexFlavor::FullText => {
                let mut facade: IndexFacade<String> = IndexFacade::new(name, flavor);
                facade.configure(config)?;
                facade.create(store, cluster_id)?;
                Ok(IndexHandle::Text(facade))
            }
            IndexFlavor::Unique | IndexFlavor::NonUnique => {
                let mut facade: IndexFacade<Value> = IndexFacade::new(name, flavor);
                facade.configure(config)?;
                facade.create(store, cluster_id)?;
                Ok(IndexHandle::Value(facade))
            }
        }
    }

    fn put(&self, value: &Value, rid: Rid) -> Result<(), IndexError> {
        match self {
            IndexHandle::Value(facade) => facade.put(value.clone(), rid),
            IndexHandle::Text(facade) => facade.index_document(rid, &value_as_text(value)),
        }
    }

    fn remove(&self, value: &Value, rid: Rid) -> Result<(), IndexError> {
        match self {
            IndexHandle::Value(facade) => facade.remove(value, Some(rid)),
            IndexHandle::Text(facade) => {
                for token in tokenize(&value_as_text(value)) {
                    facade.remove(&token, Some(rid))?;
                }
                Ok(())
            }
        }
    }

    /// RIDs currently posted under `value` — every flavor answers this
    /// the same way from the caller's point of view, even though a
    /// unique index only ever has zero or one.
    fn lookup(&self, value: &Value) -> Result<Vec<Rid>, IndexError> {
        match self {
            IndexHandle::Value(facade) => Ok(facade.get(value)?.into_rids()),
            IndexHandle::Text(facade) => facade.search(&value_as_text(value)),
        }
    }

    fn on_tx_event(&self, event: TxEvent) {
        match self {
            IndexHandle::Value(facade) => facade.on_tx_event(event),
            IndexHandle::Text(facade) => facade.on_tx_event(event),
        }
    }

    fn flush(&self) -> Result<(), IndexError> {
        match self {
            IndexHandle::Value(facade) => facade.flush(),
            IndexHandle::Text(facade) => facade.flush(),
        }
    }
}

/// Renders a column value as the text a full-text index tokenizes. Plain
/// `Value::Text` passes through; other variants use their ordinary
/// display form so indexing a non-text column doesn't just silently drop
/// every row.
fn value_as_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Null => String::new(),
    }
}

pub struct IndexEntry {
    pub name: String,
    pub column: String,
    pub kind: IndexKind,
    handle: IndexHandle,
}

impl IndexEntry {
    pub fn put(&self, value: &Value, rid: Rid) -> Result<(), IndexError> {
        self.handle.put(value, rid)
    }

    pub fn remove(&self, value: &Value, rid: Rid) -> Result<(), IndexError> {
        self.handle.remove(value, rid)
    }

    pub fn lookup(&self, value: &Value) -> Result<Vec<Rid>, IndexError> {
        self.handle.lookup(value)
    }
}

pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub data_cluster: i32,
    /// Row storage by position; `None` marks a deleted row so its `Rid`
    /// never gets reassigned to a different row.
    pub rows: Vec<Option<Vec<Value>>>,
    pub indexes: Vec<IndexEntry>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn index_on_column(&self, column: &str) -> Option<&IndexEntry> {
        self.indexes.iter().find(|idx| idx.column == column)
    }

    pub fn index_named(&self, name: &str) -> Option<usize> {
        self.indexes.iter().position(|idx| idx.name == name)
    }

    pub fn row_rid(&self, position: usize) -> Rid {
        Rid::new(self.data_cluster, position as i64)
    }

    pub fn live_rows(&self) -> impl Iterator<Item = (Rid, &Vec<Value>)> {
        self.rows.iter().enumerate().filter_map(move |(pos, row)| {
            row.as_ref().map(|r| (Rid::new(self.data_cluster, pos as i64), r))
        })
    }

    pub fn on_tx_event(&self, event: TxEvent) {
        for index in &self.indexes {
            index.handle.on_tx_event(event);
        }
    }

    pub fn flush_indexes(&self) -> Result<(), IndexError> {
        for index in &self.indexes {
            index.handle.flush()?;
        }
        Ok(())
    }
}

/// A snapshot of every table's row vector, taken at `BEGIN` and restored
/// verbatim on `ROLLBACK`. DDL (`CREATE`/`DROP`/`ALTER TABLE`, `CREATE`/
/// `DROP INDEX`) is intentionally outside this — like most SQL engines,
/// schema changes auto-commit even inside an open transaction.
pub struct Database {
    pub store: Arc<dyn RecordStore>,
    pub clusters: ClusterRegistry,
    pub tables: HashMap<String, Table>,
    index_names: HashSet<String>,
    transaction: Option<HashMap<String, Vec<Option<Vec<Value>>>>>,
}

impl Database {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Database {
            store,
            clusters: ClusterRegistry::new(),
            tables: HashMap::new(),
            index_names: HashSet::new(),
            transaction: None,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn begin(&mut self) -> Result<(), String> {
        if self.transaction.is_some() {
            return Err("a transaction is already open".to_string());
        }
        let snapshot = self.tables.iter().map(|(name, table)| (name.clone(), table.rows.clone())).collect();
        self.transaction = Some(snapshot);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), String> {
        if self.transaction.take().is_none() {
            return Err("no transaction is open".to_string());
        }
        for table in self.tables.values() {
            table.on_tx_event(TxEvent::PreCommit);
            table.on_tx_event(TxEvent::PostCommit);
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), String> {
        let snapshot = self.transaction.take().ok_or_else(|| "no transaction is open".to_string())?;
        for (name, rows) in snapshot {
            if let Some(table) = self.tables.get_mut(&name) {
                table.rows = rows;
            }
        }
        for table in self.tables.values() {
            table.on_tx_event(TxEvent::Rollback);
        }
        Ok(())
    }

    /// Called after a standalone (non-transactional) mutating statement:
    /// commits that one statement's index changes immediately, the way
    /// autocommit mode does in most SQL engines.
    pub fn autocommit(&self, table: &str) {
        if self.transaction.is_none() {
            if let Some(table) = self.tables.get(table) {
                table.on_tx_event(TxEvent::PreCommit);
                table.on_tx_event(TxEvent::PostCommit);
            }
        }
    }

    pub fn create_table(&mut self, name: String, columns: Vec<ColumnDefinition>) -> Result<(), String> {
        if self.tables.contains_key(&name) {
            return Err(format!("Table '{}' already exists", name));
        }
        let data_cluster = self.clusters.allocate();
        self.tables.insert(
            name.clone(),
            Table { name, columns, data_cluster, rows: Vec::new(), indexes: Vec::new() },
        );
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<(), String> {
        let table = self.tables.remove(name).ok_or_else(|| format!("Table '{}' does not exist", name))?;
        for index in &table.indexes {
            self.index_names.remove(&index.name);
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&Table, String> {
        self.tables.get(name).ok_or_else(|| format!("Table '{}' does not exist", name))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table, String> {
        self.tables.get_mut(name).ok_or_else(|| format!("Table '{}' does not exist", name))
    }

    pub fn create_index(
        &mut self,
        index_name: String,
        table_name: &str,
        column: &str,
        kind: IndexKind,
    ) -> Result<(), String> {
        if self.index_names.contains(&index_name) {
            return Err(format!("Index '{}' already exists", index_name));
        }
        let cluster_id = self.clusters.allocate();
        let store = self.store.clone();
        let table = self.table_mut(table_name)?;
        if table.column_index(column).is_none() {
            return Err(format!("Column '{}' does not exist on table '{}'", column, table_name));
        }
        if table.index_on_column(column).is_some() {
            return Err(format!("Column '{}' already has an index", column));
        }

        let flavor = IndexFlavor::from(kind);
        let handle = IndexHandle::create(&index_name, flavor, store, cluster_id).map_err(|e| e.to_string())?;
        let entry = IndexEntry { name: index_name.clone(), column: column.to_string(), kind, handle };

        let col_idx = table.column_index(column).unwrap();
        for (rid, row) in table.live_rows() {
            entry.put(&row[col_idx], rid).map_err(|e| e.to_string())?;
        }

        table.indexes.push(entry);
        self.index_names.insert(index_name);
        Ok(())
    }

    pub fn drop_index(&mut self, index_name: &str) -> Result<(), String> {
        if !self.index_names.remove(index_name) {
            return Err(format!("Index '{}' does not exist", index_name));
        }
        for table in self.tables.values_mut() {
            if let Some(pos) = table.index_named(index_name) {
                table.indexes.remove(pos);
                return Ok(());
            }
        }
        Err(format!("Index '{}' does not exist", index_name))
    }

    /// Drops every table and index, keeping the same backing store and
    /// cluster registry. Used between test runs and by `reset_database`.
    pub fn reset(&mut self) {
        self.tables.clear();
        self.index_names.clear();
        self.transaction = None;
    }
}
