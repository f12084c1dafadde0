//! Cache configuration.

use std::path::PathBuf;

/// Configuration for opening a sort-key cache.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Keep all entries in memory instead of on disk.
    pub in_memory: bool,

    /// Database directory for the durable cache. Required unless `in_memory`;
    /// opening a durable cache without it is a configuration error.
    pub db_location: Option<PathBuf>,

    /// Retention budget used by prune passes: how many newest entries each
    /// contract namespace keeps. Clamped to at least 1, since pruning never
    /// drops a namespace's most recent entry.
    pub max_entries_per_contract: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            in_memory: false,
            db_location: None,
            max_entries_per_contract: DEFAULT_MAX_ENTRIES_PER_CONTRACT,
        }
    }
}

impl CacheOptions {
    /// An in-memory configuration, for tests and ephemeral evaluation.
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            db_location: None,
            ..Self::default()
        }
    }

    /// A durable configuration rooted at `db_location`.
    pub fn durable(db_location: impl Into<PathBuf>) -> Self {
        Self {
            in_memory: false,
            db_location: Some(db_location.into()),
            ..Self::default()
        }
    }
}

/// Default per-namespace retention budget.
pub const DEFAULT_MAX_ENTRIES_PER_CONTRACT: usize = 5;
