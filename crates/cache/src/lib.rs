//! Sort-key cache trait and shared types.
//!
//! This crate defines the cache abstraction used by the replay engine to
//! persist contract state snapshots, along with shared types and utilities
//! that both the in-memory and RocksDB cache implementations need.
//!
//! # Design
//!
//! The cache is an ordered key-value store partitioned into per-contract
//! namespaces. Within a namespace, entries are keyed by `SortKey` and the
//! defining operation is `get_less_or_equal`: the nearest snapshot at or
//! before a requested position, found by ordered seeking rather than a scan.
//!
//! The replay engine owns a cache handle and treats every operation as a
//! suspension point, so the trait is async:
//! - `MemoryCache` wraps an ordered persistent map
//! - `RocksDbCache` wraps a lazily-opened RocksDB database
//!
//! Values cross the trait boundary as typed `V`, but implementations store
//! serialized JSON bytes. Every read deserializes into a fresh owned value,
//! which is what makes cached snapshots safe to hand to callers that mutate
//! them.

#![warn(missing_docs)]

mod error;
pub mod keys;
mod options;
mod store;

pub mod test_helpers;

pub use error::CacheError;
pub use options::{CacheOptions, DEFAULT_MAX_ENTRIES_PER_CONTRACT};
pub use store::SortKeyCache;
