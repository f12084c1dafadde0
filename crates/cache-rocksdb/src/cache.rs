//! Durable cache backend on RocksDB.

use async_trait::async_trait;
use parking_lot::RwLock;
use ratchet_cache::{keys, CacheError, SortKeyCache};
use ratchet_types::{CacheEntry, CacheKey, ContractId, PruneStats, SortKey};
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, Level};

/// RocksDB-backed cache for durable deployments.
///
/// Everything lives in the default column family. Keys are the composite
/// `namespace ++ NUL ++ sort key` layout from [`ratchet_cache::keys`], so
/// nearest-match reads are single `seek_for_prev` calls and namespace scans
/// are contiguous range scans.
///
/// Construction does not open the database; the first operation does. A
/// closed handle reopens the same way on its next use.
pub struct RocksDbCache<V> {
    /// Open database, or `None` before first use and after `close`.
    db: RwLock<Option<Arc<DB>>>,
    path: PathBuf,
    config: RocksDbConfig,
    _value: PhantomData<fn() -> V>,
}

impl<V> RocksDbCache<V> {
    /// Create a handle for the database at `path` with default tuning.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, RocksDbConfig::default())
    }

    /// Create a handle with custom tuning.
    pub fn with_config(path: impl Into<PathBuf>, config: RocksDbConfig) -> Self {
        Self {
            db: RwLock::new(None),
            path: path.into(),
            config,
            _value: PhantomData,
        }
    }

    /// Filesystem location of the database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw handle to the underlying database, opening it if necessary.
    ///
    /// Escape hatch for operational tooling. Clones of the returned `Arc`
    /// keep the database open past a later `close`.
    pub fn db(&self) -> Result<Arc<DB>, CacheError> {
        self.handle()
    }

    fn handle(&self) -> Result<Arc<DB>, CacheError> {
        if let Some(db) = self.db.read().as_ref() {
            return Ok(Arc::clone(db));
        }

        let mut slot = self.db.write();
        // Lost the open race; use the winner's handle.
        if let Some(db) = slot.as_ref() {
            return Ok(Arc::clone(db));
        }
        let db = Arc::new(Self::open(&self.path, &self.config)?);
        *slot = Some(Arc::clone(&db));
        Ok(db)
    }

    fn open(path: &Path, config: &RocksDbConfig) -> Result<DB, CacheError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Performance tuning
        opts.set_max_background_jobs(config.max_background_jobs);
        if config.bytes_per_sync > 0 {
            opts.set_bytes_per_sync(config.bytes_per_sync as u64);
        }
        opts.set_keep_log_file_num(config.keep_log_file_num);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_write_buffer_size(config.write_buffer_size);

        // Compression
        opts.set_compression_type(config.compression.to_rocksdb());

        // Block cache and bloom filter
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        if let Some(cache_size) = config.block_cache_size {
            let cache = rocksdb::Cache::new_lru_cache(cache_size);
            block_opts.set_block_cache(&cache);
        }
        if config.bloom_filter_bits > 0.0 {
            block_opts.set_bloom_filter(config.bloom_filter_bits, false);
        }
        opts.set_block_based_table_factory(&block_opts);

        DB::open(&opts, path).map_err(|e| CacheError::Storage(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn malformed_key(storage_key: &[u8]) -> CacheError {
        CacheError::Storage(format!("malformed key: {storage_key:?}"))
    }

    /// Iterate keys in `[start, end)`, or to the end of the database when
    /// `end` is `None`. Iterator errors surface as a final `Err` item.
    fn iter_range(
        db: &DB,
        start: Vec<u8>,
        end: Option<Vec<u8>>,
    ) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), CacheError>> + '_ {
        let mut iter = db.raw_iterator();
        iter.seek(&start);
        let mut done = false;

        std::iter::from_fn(move || {
            if done {
                return None;
            }
            if iter.valid() {
                let key = iter.key()?;
                if end.as_ref().is_some_and(|end| key >= end.as_slice()) {
                    done = true;
                    return None;
                }
                let k: Box<[u8]> = Box::from(key);
                let v: Box<[u8]> = Box::from(iter.value()?);
                iter.next();
                Some(Ok((k, v)))
            } else {
                done = true;
                iter.status()
                    .err()
                    .map(|e| Err(CacheError::Storage(e.to_string())))
            }
        })
    }

    /// Decode the entry under the iterator cursor if it belongs to the
    /// namespace, checking iterator status on an exhausted cursor.
    fn entry_at_cursor(
        iter: &rocksdb::DBRawIterator<'_>,
        prefix: &[u8],
    ) -> Result<Option<CacheEntry<V>>, CacheError>
    where
        V: DeserializeOwned,
    {
        if !iter.valid() {
            iter.status()
                .map_err(|e| CacheError::Storage(e.to_string()))?;
            return Ok(None);
        }
        match (iter.key(), iter.value()) {
            (Some(storage_key), Some(bytes)) if storage_key.starts_with(prefix) => {
                let key =
                    keys::split_storage_key(storage_key).ok_or_else(|| Self::malformed_key(storage_key))?;
                Ok(Some(CacheEntry::new(key.sort_key, Self::decode(bytes)?)))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl<V> SortKeyCache<V> for RocksDbCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[instrument(level = Level::DEBUG, skip_all, fields(
        found = tracing::field::Empty,
        latency_us = tracing::field::Empty,
    ))]
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>, CacheError> {
        let start = Instant::now();
        let db = self.handle()?;
        let storage_key = keys::to_storage_key(key);
        let result = db
            .get(&storage_key)
            .map_err(|e| CacheError::Storage(e.to_string()))?;

        let span = tracing::Span::current();
        span.record("found", result.is_some());
        span.record("latency_us", start.elapsed().as_micros() as u64);

        match result {
            Some(bytes) => Ok(Some(CacheEntry::new(
                key.sort_key.clone(),
                Self::decode(&bytes)?,
            ))),
            None => Ok(None),
        }
    }

    async fn get_last(&self, contract_id: &ContractId) -> Result<Option<CacheEntry<V>>, CacheError> {
        let db = self.handle()?;
        let prefix = keys::namespace_prefix(contract_id);
        let end = match keys::next_prefix(&prefix) {
            Some(end) => end,
            None => return Ok(None),
        };

        // The end bound embeds no NUL, so it can never be a stored key;
        // seeking backwards from it lands on the namespace's greatest entry
        // or before the namespace entirely.
        let mut iter = db.raw_iterator();
        iter.seek_for_prev(&end);
        Self::entry_at_cursor(&iter, &prefix)
    }

    #[instrument(level = Level::DEBUG, skip_all, fields(
        found = tracing::field::Empty,
        latency_us = tracing::field::Empty,
    ))]
    async fn get_less_or_equal(
        &self,
        contract_id: &ContractId,
        sort_key: &SortKey,
    ) -> Result<Option<CacheEntry<V>>, CacheError> {
        let start = Instant::now();
        let db = self.handle()?;
        let prefix = keys::namespace_prefix(contract_id);
        let upper = keys::to_storage_key(&CacheKey {
            contract_id: contract_id.clone(),
            sort_key: sort_key.clone(),
        });

        let mut iter = db.raw_iterator();
        iter.seek_for_prev(&upper);
        let result = Self::entry_at_cursor(&iter, &prefix);

        let span = tracing::Span::current();
        if let Ok(entry) = &result {
            span.record("found", entry.is_some());
        }
        span.record("latency_us", start.elapsed().as_micros() as u64);

        result
    }

    async fn put(&self, key: &CacheKey, value: &V) -> Result<(), CacheError> {
        let db = self.handle()?;
        let storage_key = keys::to_storage_key(key);
        let bytes = serde_json::to_vec(value)?;
        db.put(&storage_key, bytes)
            .map_err(|e| CacheError::Storage(e.to_string()))
    }

    async fn delete(&self, contract_id: &ContractId) -> Result<(), CacheError> {
        let db = self.handle()?;
        let prefix = keys::namespace_prefix(contract_id);
        let end = match keys::next_prefix(&prefix) {
            Some(end) => end,
            None => return Ok(()),
        };

        let mut batch = WriteBatch::default();
        for item in Self::iter_range(&db, prefix, Some(end)) {
            let (storage_key, _) = item?;
            batch.delete(&storage_key);
        }
        db.write(batch)
            .map_err(|e| CacheError::Storage(e.to_string()))
    }

    async fn all_contracts(&self) -> Result<Vec<ContractId>, CacheError> {
        let db = self.handle()?;
        let mut contracts: Vec<ContractId> = Vec::new();
        for item in Self::iter_range(&db, Vec::new(), None) {
            let (storage_key, _) = item?;
            let key =
                keys::split_storage_key(&storage_key).ok_or_else(|| Self::malformed_key(&storage_key))?;
            if contracts.last() != Some(&key.contract_id) {
                contracts.push(key.contract_id);
            }
        }
        Ok(contracts)
    }

    async fn get_last_sort_key(&self) -> Result<Option<SortKey>, CacheError> {
        // Sort keys are compared across namespaces, so this scans every key
        // and compares suffixes rather than taking the database maximum.
        let db = self.handle()?;
        let mut last: Option<SortKey> = None;
        for item in Self::iter_range(&db, Vec::new(), None) {
            let (storage_key, _) = item?;
            let sort_key =
                keys::sort_key_suffix(&storage_key).ok_or_else(|| Self::malformed_key(&storage_key))?;
            if last.as_ref().is_none_or(|l| sort_key > *l) {
                last = Some(sort_key);
            }
        }
        Ok(last)
    }

    async fn get_num_entries(&self) -> Result<usize, CacheError> {
        let db = self.handle()?;
        let mut count = 0usize;
        for item in Self::iter_range(&db, Vec::new(), None) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    async fn prune(&self, entries_stored: usize) -> Result<PruneStats, CacheError> {
        let keep = entries_stored.max(1);
        let db = self.handle()?;

        let mut entries_before = 0usize;
        let mut size_before = 0u64;
        let mut doomed_entries = 0usize;
        let mut doomed_bytes = 0u64;
        let mut batch = WriteBatch::default();

        // One ordered pass: keys arrive grouped by namespace, oldest sort
        // key first, so each group's prunable prefix is its leading entries.
        let mut namespace: Vec<(Box<[u8]>, u64)> = Vec::new();
        let mut current: Option<ContractId> = None;
        for item in Self::iter_range(&db, Vec::new(), None) {
            let (storage_key, value) = item?;
            entries_before += 1;
            size_before += value.len() as u64;
            let key =
                keys::split_storage_key(&storage_key).ok_or_else(|| Self::malformed_key(&storage_key))?;
            if current.as_ref() != Some(&key.contract_id) {
                if namespace.len() > keep {
                    for (doomed, len) in namespace.drain(..namespace.len() - keep) {
                        batch.delete(&doomed);
                        doomed_entries += 1;
                        doomed_bytes += len;
                    }
                }
                namespace.clear();
                current = Some(key.contract_id);
            }
            namespace.push((storage_key, value.len() as u64));
        }
        if namespace.len() > keep {
            for (doomed, len) in namespace.drain(..namespace.len() - keep) {
                batch.delete(&doomed);
                doomed_entries += 1;
                doomed_bytes += len;
            }
        }

        db.write(batch)
            .map_err(|e| CacheError::Storage(e.to_string()))?;

        Ok(PruneStats {
            entries_before,
            entries_after: entries_before - doomed_entries,
            size_before,
            size_after: size_before - doomed_bytes,
        })
    }

    async fn dump(&self) -> Result<Vec<(CacheKey, V)>, CacheError> {
        let db = self.handle()?;
        let mut entries = Vec::new();
        for item in Self::iter_range(&db, Vec::new(), None) {
            let (storage_key, bytes) = item?;
            let key =
                keys::split_storage_key(&storage_key).ok_or_else(|| Self::malformed_key(&storage_key))?;
            entries.push((key, Self::decode(&bytes)?));
        }
        Ok(entries)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        if let Some(db) = self.db.read().as_ref() {
            db.flush().map_err(|e| CacheError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        let mut slot = self.db.write();
        if let Some(db) = slot.take() {
            db.flush().map_err(|e| CacheError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

/// Compression type for RocksDB.
#[derive(Debug, Clone, Copy, Default)]
pub enum CompressionType {
    None,
    Snappy,
    Zlib,
    #[default]
    Lz4,
    Lz4hc,
    Zstd,
}

impl CompressionType {
    fn to_rocksdb(self) -> rocksdb::DBCompressionType {
        match self {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Snappy => rocksdb::DBCompressionType::Snappy,
            CompressionType::Zlib => rocksdb::DBCompressionType::Zlib,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
            CompressionType::Lz4hc => rocksdb::DBCompressionType::Lz4hc,
            CompressionType::Zstd => rocksdb::DBCompressionType::Zstd,
        }
    }
}

/// Tuning knobs for the RocksDB cache.
///
/// Defaults are sized for a contract-state cache, which is far smaller than
/// a full ledger database.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of background jobs
    pub max_background_jobs: i32,
    /// Write buffer size in bytes
    pub write_buffer_size: usize,
    /// Maximum number of write buffers
    pub max_write_buffer_number: i32,
    /// Block cache size in bytes (None to disable)
    pub block_cache_size: Option<usize>,
    /// Compression type
    pub compression: CompressionType,
    /// Bloom filter bits per key (0 to disable)
    pub bloom_filter_bits: f64,
    /// Bytes per sync (0 to disable)
    pub bytes_per_sync: usize,
    /// Number of log files to keep
    pub keep_log_file_num: usize,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_background_jobs: 2,
            write_buffer_size: 32 * 1024 * 1024, // 32MB
            max_write_buffer_number: 2,
            block_cache_size: Some(64 * 1024 * 1024), // 64MB
            compression: CompressionType::Lz4,
            bloom_filter_bits: 10.0,
            bytes_per_sync: 1024 * 1024, // 1MB
            keep_log_file_num: 4,
        }
    }
}
