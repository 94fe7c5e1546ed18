//! Index flavors built over the tree core: unique, non-unique, and
//! full-text, each the `IndexFacade` state machine around a `Tree`.
//!
//! A full-text index is a non-unique index on token strings; tokenizing a
//! document and posting its RID under each token is the only thing this
//! module adds on top of the non-unique posting-list behavior.

use crate::config::TreeConfig;
use crate::rid::Rid;
use crate::serializer::Codec;
use crate::store::RecordStore;
use crate::tree::{Tree, TreeError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFlavor {
    Unique,
    NonUnique,
    FullText,
}

impl From<crate::ast::IndexKind> for IndexFlavor {
    fn from(kind: crate::ast::IndexKind) -> Self {
        match kind {
            crate::ast::IndexKind::Unique => IndexFlavor::Unique,
            crate::ast::IndexKind::NonUnique => IndexFlavor::NonUnique,
            crate::ast::IndexKind::FullText => IndexFlavor::FullText,
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index '{0}' is not open")]
    NotOpen(String),
    #[error("index '{0}' is already configured or open")]
    AlreadyConfigured(String),
    #[error("unique index '{index}' already has key mapped to {existing}, refusing to remap to {attempted}")]
    DuplicateKey { index: String, existing: Rid, attempted: Rid },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// What a lookup against an index yields: a unique index returns at most
/// one RID, a non-unique or full-text index returns a posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLookup {
    Single(Option<Rid>),
    Posting(Vec<Rid>),
}

impl IndexLookup {
    pub fn into_rids(self) -> Vec<Rid> {
        match self {
            IndexLookup::Single(Some(rid)) => vec![rid],
            IndexLookup::Single(None) => Vec::new(),
            IndexLookup::Posting(rids) => rids,
        }
    }
}

enum Backing<K> {
    Unique(Tree<K, Rid>),
    Posting(Tree<K, Vec<Rid>>),
}

enum FacadeState<K> {
    Unconfigured,
    Configured(TreeConfig),
    Open(Backing<K>),
    Closed,
}

/// A named index over key type `K`. Full-text indexes fix `K = String`
/// (the token) at the call site; see `tokenize`.
pub struct IndexFacade<K> {
    name: String,
    flavor: IndexFlavor,
    state: FacadeState<K>,
}

impl<K> IndexFacade<K>
where
    K: Codec + Ord + Clone,
{
    pub fn new(name: impl Into<String>, flavor: IndexFlavor) -> Self {
        IndexFacade { name: name.into(), flavor, state: FacadeState::Unconfigured }
    }

    pub fn flavor(&self) -> IndexFlavor {
        self.flavor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, FacadeState::Open(_))
    }

    /// Idempotent given equal arguments (§4.6): re-`configure`-ing an
    /// already-`Configured` index with the same `TreeConfig` is a no-op,
    /// not an error. Only a *different* config, or configuring past
    /// `Configured` (i.e. once the index is `Open`/`Closed`), is rejected.
    pub fn configure(&mut self, config: TreeConfig) -> Result<(), IndexError> {
        match &self.state {
            FacadeState::Unconfigured => {}
            FacadeState::Configured(existing) if *existing == config => return Ok(()),
            _ => return Err(IndexError::AlreadyConfigured(self.name.clone())),
        }
        self.state = FacadeState::Configured(config);
        Ok(())
    }

    /// Builds a brand-new, empty backing tree for a configured index.
    pub fn create(&mut self, store: Arc<dyn RecordStore>, cluster_id: i32) -> Result<Rid, IndexError> {
        let config = match &self.state {
            FacadeState::Configured(config) => config.clone(),
            _ => return Err(IndexError::AlreadyConfigured(self.name.clone())),
        };
        match self.flavor {
            IndexFlavor::Unique => {
                let tree: Tree<K, Rid> = Tree::create(store, cluster_id, config)?;
                let rid = tree.descriptor_rid();
                self.state = FacadeState::Open(Backing::Unique(tree));
                Ok(rid)
            }
            IndexFlavor::NonUnique | IndexFlavor::FullText => {
                let tree: Tree<K, Vec<Rid>> = Tree::create(store, cluster_id, config)?;
                let rid = tree.descriptor_rid();
                self.state = FacadeState::Open(Backing::Posting(tree));
                Ok(rid)
            }
        }
    }

    /// Reopens an existing backing tree from its descriptor RID.
    pub fn open(
        &mut self,
        store: Arc<dyn RecordStore>,
        cluster_id: i32,
        descriptor_rid: Rid,
    ) -> Result<(), IndexError> {
        let config = match &self.state {
            FacadeState::Configured(config) => config.clone(),
            _ => return Err(IndexError::AlreadyConfigured(self.name.clone())),
        };
        self.state = match self.flavor {
            IndexFlavor::Unique => {
                let tree: Tree<K, Rid> = Tree::open(store, cluster_id, config, descriptor_rid)?;
                FacadeState::Open(Backing::Unique(tree))
            }
            IndexFlavor::NonUnique | IndexFlavor::FullText => {
                let tree: Tree<K, Vec<Rid>> = Tree::open(store, cluster_id, config, descriptor_rid)?;
                FacadeState::Open(Backing::Posting(tree))
            }
        };
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), IndexError> {
        if let FacadeState::Open(backing) = &self.state {
            match backing {
                Backing::Unique(tree) => tree.flush()?,
                Backing::Posting(tree) => tree.flush()?,
            }
        }
        self.state = FacadeState::Closed;
        Ok(())
    }

    fn backing(&self) -> Result<&Backing<K>, IndexError> {
        match &self.state {
            FacadeState::Open(backing) => Ok(backing),
            _ => Err(IndexError::NotOpen(self.name.clone())),
        }
    }

    /// Posts `key -> rid`. Semantics depend on flavor:
    /// - Unique: error if `key` already maps to a *different* RID.
    /// - NonUnique / FullText: append `rid` to the posting list if absent.
    pub fn put(&self, key: K, rid: Rid) -> Result<(), IndexError> {
        match self.backing()? {
            Backing::Unique(tree) => {
                if let Some(existing) = tree.get(&key)? {
                    if existing != rid {
                        return Err(IndexError::DuplicateKey {
                            index: self.name.clone(),
                            existing,
                            attempted: rid,
                        });
                    }
                    return Ok(());
                }
                tree.put(key, rid)?;
                Ok(())
            }
            Backing::Posting(tree) => {
                let mut posting = tree.get(&key)?.unwrap_or_default();
                if !posting.contains(&rid) {
                    posting.push(rid);
                    tree.put(key, posting)?;
                }
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &K) -> Result<IndexLookup, IndexError> {
        match self.backing()? {
            Backing::Unique(tree) => Ok(IndexLookup::Single(tree.get(key)?)),
            Backing::Posting(tree) => Ok(IndexLookup::Posting(tree.get(key)?.unwrap_or_default())),
        }
    }

    /// Removes an entry. With `rid = None`, drops the whole key. With
    /// `rid = Some(r)`, a unique index verifies `r` matches before
    /// dropping the key, and a posting-list index removes just `r` from
    /// the list (deleting the key entirely once the list empties).
    pub fn remove(&self, key: &K, rid: Option<Rid>) -> Result<(), IndexError> {
        match self.backing()? {
            Backing::Unique(tree) => {
                match rid {
                    None => {
                        tree.remove(key)?;
                    }
                    Some(expected) => {
                        if tree.get(key)? == Some(expected) {
                            tree.remove(key)?;
                        }
                    }
                }
                Ok(())
            }
            Backing::Posting(tree) => {
                match rid {
                    None => {
                        tree.remove(key)?;
                    }
                    Some(target) => {
                        if let Some(mut posting) = tree.get(key)? {
                            posting.retain(|r| *r != target);
                            if posting.is_empty() {
                                tree.remove(key)?;
                            } else {
                                tree.put(key.clone(), posting)?;
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    pub fn flush(&self) -> Result<(), IndexError> {
        match self.backing()? {
            Backing::Unique(tree) => tree.flush()?,
            Backing::Posting(tree) => tree.flush()?,
        }
        Ok(())
    }

    /// Forwards a transaction lifecycle event to the backing tree, a
    /// no-op if the index isn't open (e.g. it wasn't touched this
    /// transaction).
    pub fn on_tx_event(&self, event: crate::txn::TxEvent) {
        match &self.state {
            FacadeState::Open(Backing::Unique(tree)) => tree.apply_tx_event(event),
            FacadeState::Open(Backing::Posting(tree)) => tree.apply_tx_event(event),
            _ => {}
        }
    }
}

/// Lowercases and splits on non-alphanumeric runs. Deliberately simple —
/// no stemming, no stop-word list (§4.6 describes token -> posting list
/// mapping, not a ranked text-search engine).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl IndexFacade<String> {
    /// Posts `rid` under every distinct token of `text`. Only meaningful
    /// for a `FullText`-flavored facade, but nothing prevents calling it
    /// on a `NonUnique` string index too.
    pub fn index_document(&self, rid: Rid, text: &str) -> Result<(), IndexError> {
        let mut tokens = tokenize(text);
        tokens.sort();
        tokens.dedup();
        for token in tokens {
            self.put(token, rid)?;
        }
        Ok(())
    }

    pub fn search(&self, token: &str) -> Result<Vec<Rid>, IndexError> {
        Ok(self.get(&token.to_lowercase())?.into_rids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    fn store() -> Arc<dyn RecordStore> {
        Arc::new(MemoryRecordStore::new())
    }

    #[test]
    fn unique_index_rejects_conflicting_remap() {
        let mut index: IndexFacade<i64> = IndexFacade::new("by_id", IndexFlavor::Unique);
        index.configure(TreeConfig::default()).unwrap();
        index.create(store(), 0).unwrap();
        index.put(1, Rid::new(1, 0)).unwrap();
        index.put(1, Rid::new(1, 0)).unwrap();
        let err = index.put(1, Rid::new(1, 1)).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey { .. }));
    }

    #[test]
    fn non_unique_index_accumulates_posting_list() {
        let mut index: IndexFacade<i64> = IndexFacade::new("by_status", IndexFlavor::NonUnique);
        index.configure(TreeConfig::default()).unwrap();
        index.create(store(), 0).unwrap();
        index.put(1, Rid::new(1, 0)).unwrap();
        index.put(1, Rid::new(1, 1)).unwrap();
        assert_eq!(index.get(&1).unwrap(), IndexLookup::Posting(vec![Rid::new(1, 0), Rid::new(1, 1)]));
        index.remove(&1, Some(Rid::new(1, 0))).unwrap();
        assert_eq!(index.get(&1).unwrap(), IndexLookup::Posting(vec![Rid::new(1, 1)]));
    }

    #[test]
    fn removing_last_posting_drops_the_key() {
        let mut index: IndexFacade<i64> = IndexFacade::new("by_status", IndexFlavor::NonUnique);
        index.configure(TreeConfig::default()).unwrap();
        index.create(store(), 0).unwrap();
        index.put(1, Rid::new(1, 0)).unwrap();
        index.remove(&1, Some(Rid::new(1, 0))).unwrap();
        assert_eq!(index.get(&1).unwrap(), IndexLookup::Posting(Vec::new()));
    }

    #[test]
    fn configure_is_idempotent_given_equal_arguments() {
        let mut index: IndexFacade<i64> = IndexFacade::new("by_id", IndexFlavor::Unique);
        index.configure(TreeConfig::default()).unwrap();
        index.configure(TreeConfig::default()).unwrap();
        let err = index.configure(TreeConfig { node_page_size: 2, ..TreeConfig::default() }).unwrap_err();
        assert!(matches!(err, IndexError::AlreadyConfigured(_)));
    }

    #[test]
    fn operations_before_open_fail() {
        let index: IndexFacade<i64> = IndexFacade::new("by_id", IndexFlavor::Unique);
        let err = index.put(1, Rid::new(0, 0)).unwrap_err();
        assert!(matches!(err, IndexError::NotOpen(_)));
    }

    #[test]
    fn full_text_index_tokenizes_and_finds_by_word() {
        let mut index: IndexFacade<String> = IndexFacade::new("body_text", IndexFlavor::FullText);
        index.configure(TreeConfig::default()).unwrap();
        index.create(store(), 0).unwrap();
        index.index_document(Rid::new(1, 0), "The quick brown fox").unwrap();
        index.index_document(Rid::new(1, 1), "Quick brown dogs bark").unwrap();
        assert_eq!(index.search("quick").unwrap(), vec![Rid::new(1, 0), Rid::new(1, 1)]);
        assert_eq!(index.search("fox").unwrap(), vec![Rid::new(1, 0)]);
        assert!(index.search("absent").unwrap().is_empty());
    }

    #[test]
    fn reopen_after_close_preserves_entries() {
        let backing = store();
        let mut index: IndexFacade<i64> = IndexFacade::new("by_id", IndexFlavor::Unique);
        index.configure(TreeConfig::default()).unwrap();
        let descriptor_rid = index.create(backing.clone(), 0).unwrap();
        index.put(7, Rid::new(2, 3)).unwrap();
        index.close().unwrap();

        let mut reopened: IndexFacade<i64> = IndexFacade::new("by_id", IndexFlavor::Unique);
        reopened.configure(TreeConfig::default()).unwrap();
        reopened.open(backing, 0, descriptor_rid).unwrap();
        assert_eq!(reopened.get(&7).unwrap(), IndexLookup::Single(Some(Rid::new(2, 3))));
    }
}
