//! The sort-key cache trait implemented by all cache backends.

use crate::CacheError;
use async_trait::async_trait;
use ratchet_types::{CacheEntry, CacheKey, ContractId, PruneStats, SortKey};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A persistent, ordered cache of per-contract values keyed by
/// `(contract id, sort key)`.
///
/// Each contract id owns one namespace; within it, entries are totally
/// ordered by [`SortKey`] and no two entries share a key. The defining
/// operation is [`get_less_or_equal`]: the replay engine uses it to find the
/// newest snapshot not past a requested position, then replays only what is
/// missing.
///
/// Reads return entries deserialized from stored bytes: deep, independently
/// owned copies that callers may freely mutate.
///
/// Backends open lazily: the first operation that needs the underlying store
/// opens it, and [`close`] returns the handle to the unopened state.
/// Misses are `Ok(None)`; only engine faults are `Err`.
///
/// [`get_less_or_equal`]: SortKeyCache::get_less_or_equal
/// [`close`]: SortKeyCache::close
#[async_trait]
pub trait SortKeyCache<V>: Send + Sync
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Exact-match lookup of one entry.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>, CacheError>;

    /// The entry with the greatest sort key in the contract's namespace.
    async fn get_last(
        &self,
        contract_id: &ContractId,
    ) -> Result<Option<CacheEntry<V>>, CacheError>;

    /// The entry with the greatest sort key at or before `sort_key`.
    ///
    /// Runs in time proportional to the seek, not the namespace size.
    async fn get_less_or_equal(
        &self,
        contract_id: &ContractId,
        sort_key: &SortKey,
    ) -> Result<Option<CacheEntry<V>>, CacheError>;

    /// Upsert one entry; an existing entry at the same key is overwritten.
    async fn put(&self, key: &CacheKey, value: &V) -> Result<(), CacheError>;

    /// Drop a contract's whole namespace.
    async fn delete(&self, contract_id: &ContractId) -> Result<(), CacheError>;

    /// Distinct contract ids currently present, in ascending order.
    async fn all_contracts(&self) -> Result<Vec<ContractId>, CacheError>;

    /// The maximum sort key across all namespaces.
    ///
    /// Computed by scanning every key and comparing sort-key suffixes, so the
    /// cost is proportional to the total entry count. Callers should not
    /// assume this is cheap.
    async fn get_last_sort_key(&self) -> Result<Option<SortKey>, CacheError>;

    /// Total entry count across all namespaces.
    async fn get_num_entries(&self) -> Result<usize, CacheError>;

    /// Keep only the `entries_stored` newest entries of every namespace.
    ///
    /// `entries_stored` is clamped to at least 1. Namespaces with no more
    /// than `entries_stored` entries are left untouched.
    async fn prune(&self, entries_stored: usize) -> Result<PruneStats, CacheError>;

    /// Every entry in the cache, in stored key order. Operational tooling
    /// only; never on the evaluation path.
    async fn dump(&self) -> Result<Vec<(CacheKey, V)>, CacheError>;

    /// Force buffered writes down to durable storage.
    async fn flush(&self) -> Result<(), CacheError>;

    /// Flush and release the underlying store. The handle stays valid: the
    /// next operation reopens lazily.
    async fn close(&self) -> Result<(), CacheError>;
}
