//! Error type for cache operations.

/// Error type for cache operations.
///
/// A miss is never an error: lookups return `Ok(None)`. These variants cover
/// the storage-engine-level faults that must surface to the caller. A
/// [`CacheError::Storage`] fault is fatal for the failing operation but the
/// cache handle stays usable; other namespaces are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache was configured without a database location in durable mode.
    /// Raised at open time, before any operation touches disk.
    #[error("cache configuration error: {0}")]
    Configuration(String),

    /// Filesystem error while preparing the database location.
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Fault reported by the underlying storage engine.
    #[error("storage engine error: {0}")]
    Storage(String),

    /// A stored value could not be serialized or deserialized.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
