//! Snapshot cache construction.

use ratchet_cache::{CacheError, CacheOptions, SortKeyCache};
use ratchet_cache_memory::MemoryCache;
use ratchet_cache_rocksdb::RocksDbCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Open the sort-key cache described by `options`.
///
/// `in_memory` selects the volatile backend; otherwise `db_location` must
/// name where the RocksDB database lives. The durable backend opens its
/// database lazily on first use, so this never touches disk itself.
pub fn open_sort_key_cache<V>(
    options: &CacheOptions,
) -> Result<Arc<dyn SortKeyCache<V>>, CacheError>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    if options.in_memory {
        info!("opening in-memory sort-key cache");
        return Ok(Arc::new(MemoryCache::new()));
    }
    let path = options.db_location.as_ref().ok_or_else(|| {
        CacheError::Configuration("no db location specified".to_string())
    })?;
    info!(path = %path.display(), "opening rocksdb sort-key cache");
    Ok(Arc::new(RocksDbCache::new(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_types::EvalStateResult;

    #[test]
    fn test_durable_cache_requires_a_location() {
        // Default is durable with no location, which must be refused.
        let options = CacheOptions::default();
        let result = open_sort_key_cache::<EvalStateResult<serde_json::Value>>(&options);
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_in_memory_cache_opens_without_a_location() {
        let options = CacheOptions::in_memory();
        assert!(open_sort_key_cache::<EvalStateResult<serde_json::Value>>(&options).is_ok());
    }
}
