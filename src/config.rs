//! Tunables for a tree instance, and the `memory:` / `plocal:<path>`
//! storage engine URL selector.

#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    pub node_page_size: u16,
    pub load_factor: f64,
    pub entry_points_size: usize,
    pub optimize_threshold: u64,
    pub optimize_entrypoints_factor: f64,
    pub max_updates_before_save: u64,
    pub runtime_checks: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            node_page_size: 1024,
            load_factor: 0.7,
            entry_points_size: 64,
            optimize_threshold: 1024,
            optimize_entrypoints_factor: 1.0,
            max_updates_before_save: 1,
            runtime_checks: false,
        }
    }
}

impl TreeConfig {
    /// `0` disables the usage-counter-driven optimize pass entirely; `pre-
    /// commit`/`close` still flush unconditionally, independent of this
    /// setting.
    pub fn optimize_enabled(&self) -> bool {
        self.optimize_threshold > 0
    }

    /// `0` disables lazy-save outside explicit commit/close boundaries
    /// (DESIGN.md Open Question #1); `1` saves eagerly after every
    /// mutation; `>1` batches.
    pub fn lazy_save_enabled(&self) -> bool {
        self.max_updates_before_save > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageUrl {
    Memory,
    Local(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageUrlError {
    #[error("storage url '{0}' has no recognized scheme (expected 'memory:' or 'plocal:<path>')")]
    UnrecognizedScheme(String),
    #[error("plocal: url is missing a path")]
    MissingPath,
}

impl StorageUrl {
    pub fn parse(url: &str) -> Result<Self, StorageUrlError> {
        if let Some(rest) = url.strip_prefix("memory:") {
            let _ = rest;
            Ok(StorageUrl::Memory)
        } else if let Some(path) = url.strip_prefix("plocal:") {
            if path.is_empty() {
                Err(StorageUrlError::MissingPath)
            } else {
                Ok(StorageUrl::Local(path.to_string()))
            }
        } else {
            Err(StorageUrlError::UnrecognizedScheme(url.to_string()))
        }
    }
}
