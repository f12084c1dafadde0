//! Cache backend holding all entries in an ordered persistent map.

use async_trait::async_trait;
use im::OrdMap;
use parking_lot::RwLock;
use ratchet_cache::{keys, CacheError, SortKeyCache};
use ratchet_types::{CacheEntry, CacheKey, ContractId, PruneStats, SortKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// In-memory cache backend.
///
/// Stores serialized JSON values under composite `namespace ++ NUL ++ sort key`
/// byte keys. The map is ordered, so:
/// - namespace scans are contiguous range scans
/// - `get_less_or_equal` is an ordered seek, not a filter pass
///
/// All values round-trip through JSON bytes exactly like the durable backend,
/// so reads hand out deep owned copies here too.
pub struct MemoryCache<V> {
    data: RwLock<OrdMap<Vec<u8>, Vec<u8>>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> MemoryCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(OrdMap::new()),
            _value: PhantomData,
        }
    }

    /// Number of entries stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// A structurally-shared copy of the raw stored bytes, in key order.
    ///
    /// O(1) escape hatch for operational tooling; the returned map is a
    /// consistent point-in-time view.
    pub fn raw_entries(&self) -> OrdMap<Vec<u8>, Vec<u8>> {
        self.data.read().clone()
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> SortKeyCache<V> for MemoryCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>, CacheError> {
        let storage_key = keys::to_storage_key(key);
        let data = self.data.read();
        match data.get(&storage_key) {
            Some(bytes) => Ok(Some(CacheEntry::new(
                key.sort_key.clone(),
                Self::decode(bytes)?,
            ))),
            None => Ok(None),
        }
    }

    async fn get_last(&self, contract_id: &ContractId) -> Result<Option<CacheEntry<V>>, CacheError> {
        let prefix = keys::namespace_prefix(contract_id);
        let end = match keys::next_prefix(&prefix) {
            Some(end) => end,
            None => return Ok(None),
        };
        let data = self.data.read();
        match data.range(prefix..end).next_back() {
            Some((storage_key, bytes)) => {
                let key = keys::split_storage_key(storage_key)
                    .ok_or_else(|| CacheError::Storage(format!("malformed key: {storage_key:?}")))?;
                Ok(Some(CacheEntry::new(key.sort_key, Self::decode(bytes)?)))
            }
            None => Ok(None),
        }
    }

    async fn get_less_or_equal(
        &self,
        contract_id: &ContractId,
        sort_key: &SortKey,
    ) -> Result<Option<CacheEntry<V>>, CacheError> {
        let prefix = keys::namespace_prefix(contract_id);
        let upper = keys::to_storage_key(&CacheKey {
            contract_id: contract_id.clone(),
            sort_key: sort_key.clone(),
        });
        let data = self.data.read();
        match data.range(prefix..=upper).next_back() {
            Some((storage_key, bytes)) => {
                let key = keys::split_storage_key(storage_key)
                    .ok_or_else(|| CacheError::Storage(format!("malformed key: {storage_key:?}")))?;
                Ok(Some(CacheEntry::new(key.sort_key, Self::decode(bytes)?)))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, value: &V) -> Result<(), CacheError> {
        let storage_key = keys::to_storage_key(key);
        let bytes = serde_json::to_vec(value)?;
        self.data.write().insert(storage_key, bytes);
        Ok(())
    }

    async fn delete(&self, contract_id: &ContractId) -> Result<(), CacheError> {
        let prefix = keys::namespace_prefix(contract_id);
        let end = match keys::next_prefix(&prefix) {
            Some(end) => end,
            None => return Ok(()),
        };
        let mut data = self.data.write();
        let doomed: Vec<Vec<u8>> = data.range(prefix..end).map(|(k, _)| k.clone()).collect();
        for key in doomed {
            data.remove(&key);
        }
        Ok(())
    }

    async fn all_contracts(&self) -> Result<Vec<ContractId>, CacheError> {
        let data = self.data.read();
        let mut contracts: Vec<ContractId> = Vec::new();
        for storage_key in data.keys() {
            let key = keys::split_storage_key(storage_key)
                .ok_or_else(|| CacheError::Storage(format!("malformed key: {storage_key:?}")))?;
            if contracts.last() != Some(&key.contract_id) {
                contracts.push(key.contract_id);
            }
        }
        Ok(contracts)
    }

    async fn get_last_sort_key(&self) -> Result<Option<SortKey>, CacheError> {
        // Sort keys are compared across namespaces, so this is a suffix
        // comparison over every key, not a map-order maximum.
        let data = self.data.read();
        let mut last: Option<SortKey> = None;
        for storage_key in data.keys() {
            let sort_key = keys::sort_key_suffix(storage_key)
                .ok_or_else(|| CacheError::Storage(format!("malformed key: {storage_key:?}")))?;
            if last.as_ref().is_none_or(|l| sort_key > *l) {
                last = Some(sort_key);
            }
        }
        Ok(last)
    }

    async fn get_num_entries(&self) -> Result<usize, CacheError> {
        Ok(self.data.read().len())
    }

    async fn prune(&self, entries_stored: usize) -> Result<PruneStats, CacheError> {
        let keep = entries_stored.max(1);
        let mut data = self.data.write();

        let entries_before = data.len();
        let size_before: u64 = data.values().map(|v| v.len() as u64).sum();

        // Group keys by namespace; map order keeps each group contiguous and
        // sorted oldest-first.
        let mut doomed: Vec<Vec<u8>> = Vec::new();
        let mut namespace: Vec<Vec<u8>> = Vec::new();
        let mut current: Option<ContractId> = None;
        for storage_key in data.keys() {
            let key = keys::split_storage_key(storage_key)
                .ok_or_else(|| CacheError::Storage(format!("malformed key: {storage_key:?}")))?;
            if current.as_ref() != Some(&key.contract_id) {
                if namespace.len() > keep {
                    doomed.extend_from_slice(&namespace[..namespace.len() - keep]);
                }
                namespace.clear();
                current = Some(key.contract_id);
            }
            namespace.push(storage_key.clone());
        }
        if namespace.len() > keep {
            doomed.extend_from_slice(&namespace[..namespace.len() - keep]);
        }

        for key in doomed {
            data.remove(&key);
        }

        let entries_after = data.len();
        let size_after: u64 = data.values().map(|v| v.len() as u64).sum();
        Ok(PruneStats {
            entries_before,
            entries_after,
            size_before,
            size_after,
        })
    }

    async fn dump(&self) -> Result<Vec<(CacheKey, V)>, CacheError> {
        let data = self.data.read();
        let mut entries = Vec::with_capacity(data.len());
        for (storage_key, bytes) in data.iter() {
            let key = keys::split_storage_key(storage_key)
                .ok_or_else(|| CacheError::Storage(format!("malformed key: {storage_key:?}")))?;
            entries.push((key, Self::decode(bytes)?));
        }
        Ok(entries)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_cache::test_helpers::{put_example_namespace, put_series, snapshot};
    use serde_json::Value;

    fn contract(id: &str) -> ContractId {
        ContractId::new(id)
    }

    #[tokio::test]
    async fn test_get_exact_and_miss() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_example_namespace(&cache).await.unwrap();

        let hit = cache.get(&CacheKey::new("C1", "000003")).await.unwrap();
        assert_eq!(hit.unwrap().value, snapshot(1));

        let miss = cache.get(&CacheKey::new("C1", "000004")).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_get_less_or_equal_nearest_match() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_example_namespace(&cache).await.unwrap();

        // Between the two entries: nearest below wins.
        let entry = cache
            .get_less_or_equal(&contract("C1"), &SortKey::new("000005"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.sort_key, SortKey::new("000003"));
        assert_eq!(entry.value, snapshot(1));

        // Exactly on an entry.
        let entry = cache
            .get_less_or_equal(&contract("C1"), &SortKey::new("000007"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.sort_key, SortKey::new("000007"));

        // Before everything.
        let none = cache
            .get_less_or_equal(&contract("C1"), &SortKey::new("000001"))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_get_last() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_example_namespace(&cache).await.unwrap();

        let entry = cache.get_last(&contract("C1")).await.unwrap().unwrap();
        assert_eq!(entry.sort_key, SortKey::new("000007"));
        assert_eq!(entry.value, snapshot(2));

        assert!(cache.get_last(&contract("C2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        let key = CacheKey::new("C1", "000003");
        cache.put(&key, &snapshot(1)).await.unwrap();
        cache.put(&key, &snapshot(9)).await.unwrap();

        let entry = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.value, snapshot(9));
        assert_eq!(cache.get_num_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_namespace_leaves_others() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_series(&cache, "C1", &[("000001", 1), ("000002", 2)])
            .await
            .unwrap();
        put_series(&cache, "C2", &[("000001", 7)]).await.unwrap();

        cache.delete(&contract("C1")).await.unwrap();

        assert!(cache.get_last(&contract("C1")).await.unwrap().is_none());
        assert!(cache.get_last(&contract("C2")).await.unwrap().is_some());
        assert_eq!(cache.all_contracts().await.unwrap(), vec![contract("C2")]);
    }

    #[tokio::test]
    async fn test_all_contracts_sorted_distinct() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_series(&cache, "beta", &[("000001", 1), ("000002", 2)])
            .await
            .unwrap();
        put_series(&cache, "alpha", &[("000001", 1)]).await.unwrap();

        assert_eq!(
            cache.all_contracts().await.unwrap(),
            vec![contract("alpha"), contract("beta")]
        );
    }

    #[tokio::test]
    async fn test_get_last_sort_key_is_global() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        assert!(cache.get_last_sort_key().await.unwrap().is_none());

        // The namespace that sorts last does not hold the greatest sort key.
        put_series(&cache, "zzz", &[("000004", 1)]).await.unwrap();
        put_series(&cache, "aaa", &[("000009", 2)]).await.unwrap();

        assert_eq!(
            cache.get_last_sort_key().await.unwrap(),
            Some(SortKey::new("000009"))
        );
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_series(
            &cache,
            "C1",
            &[("000001", 1), ("000002", 2), ("000003", 3), ("000004", 4)],
        )
        .await
        .unwrap();
        put_series(&cache, "C2", &[("000001", 1)]).await.unwrap();

        let stats = cache.prune(2).await.unwrap();
        assert_eq!(stats.entries_before, 5);
        assert_eq!(stats.entries_after, 3);
        assert!(stats.size_after < stats.size_before);

        // C1 keeps exactly its two newest entries.
        assert!(cache.get(&CacheKey::new("C1", "000001")).await.unwrap().is_none());
        assert!(cache.get(&CacheKey::new("C1", "000002")).await.unwrap().is_none());
        assert!(cache.get(&CacheKey::new("C1", "000003")).await.unwrap().is_some());
        assert!(cache.get(&CacheKey::new("C1", "000004")).await.unwrap().is_some());

        // C2 was under budget and is untouched.
        assert!(cache.get(&CacheKey::new("C2", "000001")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prune_zero_clamps_to_one() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_example_namespace(&cache).await.unwrap();

        cache.prune(0).await.unwrap();

        // The most recent entry survives even with a zero budget.
        let entry = cache.get_last(&contract("C1")).await.unwrap().unwrap();
        assert_eq!(entry.sort_key, SortKey::new("000007"));
        assert_eq!(cache.get_num_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prune_example() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_example_namespace(&cache).await.unwrap();

        cache.prune(1).await.unwrap();

        assert!(cache.get(&CacheKey::new("C1", "000003")).await.unwrap().is_none());
        let entry = cache.get(&CacheKey::new("C1", "000007")).await.unwrap().unwrap();
        assert_eq!(entry.value, snapshot(2));
    }

    #[tokio::test]
    async fn test_genesis_entry_roundtrip() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        let genesis = CacheKey::new("C1", SortKey::genesis());
        cache.put(&genesis, &snapshot(0)).await.unwrap();

        let entry = cache.get(&genesis).await.unwrap().unwrap();
        assert!(entry.sort_key.is_genesis());

        // Genesis is found by nearest-match from any position.
        let entry = cache
            .get_less_or_equal(&contract("C1"), &SortKey::new("000001"))
            .await
            .unwrap()
            .unwrap();
        assert!(entry.sort_key.is_genesis());
    }

    #[tokio::test]
    async fn test_dump_in_key_order() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        put_series(&cache, "C2", &[("000001", 3)]).await.unwrap();
        put_example_namespace(&cache).await.unwrap();

        let dump = cache.dump().await.unwrap();
        let keys: Vec<String> = dump.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["C1|000003", "C1|000007", "C2|000001"]);
    }

    #[tokio::test]
    async fn test_read_returns_owned_copy() {
        let cache: MemoryCache<Value> = MemoryCache::new();
        let key = CacheKey::new("C1", "000003");
        cache.put(&key, &snapshot(1)).await.unwrap();

        let mut entry = cache.get(&key).await.unwrap().unwrap();
        entry.value["n"] = serde_json::json!(99);

        let fresh = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(fresh.value, snapshot(1));
    }
}
