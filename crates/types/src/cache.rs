//! Cache-facing types: keys, entries, prune reporting.

use crate::{ContractId, SortKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one cached snapshot: a position in one contract's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Namespace the entry belongs to.
    pub contract_id: ContractId,
    /// Position of the entry within the namespace.
    pub sort_key: SortKey,
}

impl CacheKey {
    /// Create a cache key.
    pub fn new(contract_id: impl Into<ContractId>, sort_key: impl Into<SortKey>) -> Self {
        Self {
            contract_id: contract_id.into(),
            sort_key: sort_key.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.contract_id, self.sort_key)
    }
}

/// The result of any cache lookup: a value together with the position it was
/// found at.
///
/// `value` is deserialized from the stored bytes, so it is a deep,
/// independently owned copy; callers may mutate it without affecting the
/// cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Position the value was cached at.
    pub sort_key: SortKey,
    /// The cached value.
    pub value: V,
}

impl<V> CacheEntry<V> {
    /// Create an entry.
    pub fn new(sort_key: impl Into<SortKey>, value: V) -> Self {
        Self {
            sort_key: sort_key.into(),
            value,
        }
    }
}

/// Reporting-only summary of one prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneStats {
    /// Entries across all namespaces before the pass.
    pub entries_before: usize,
    /// Entries across all namespaces after the pass.
    pub entries_after: usize,
    /// Serialized value bytes before the pass.
    pub size_before: u64,
    /// Serialized value bytes after the pass.
    pub size_after: u64,
}
