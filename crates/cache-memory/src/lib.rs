//! # In-Memory Cache
//!
//! In-memory sort-key cache backend for ephemeral evaluation and tests.
//!
//! Uses `im::OrdMap` for ordered iteration and O(1) structural-sharing
//! clones, so nearest-match lookups and namespace scans have the same shape
//! and cost profile as the durable backend, and the raw-entries escape hatch
//! can hand out a consistent view without copying the dataset.

mod cache;

pub use cache::MemoryCache;
