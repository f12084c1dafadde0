//! # RocksDB Cache
//!
//! Durable sort-key cache backend backed by RocksDB.
//!
//! All RocksDB calls are synchronous blocking I/O. Callers in async contexts
//! should use `spawn_blocking` if needed to avoid blocking the runtime.
//!
//! The database opens lazily: constructing a [`RocksDbCache`] does not touch
//! disk, the first operation does. `close` flushes and drops the handle, and
//! a later operation reopens the same path transparently.

mod cache;

pub use cache::{CompressionType, RocksDbCache, RocksDbConfig};
