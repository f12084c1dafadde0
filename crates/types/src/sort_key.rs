//! Lexicographic ordering token for interactions and cached snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque ordering token, totally ordered by lexicographic comparison.
///
/// Larger keys are later in the interaction log. Producers must zero-pad and
/// length-normalize their keys so that lexicographic order equals logical
/// chronological order; the cache compares bytes and does not enforce this.
///
/// The reference format is `{padded block height},{padded timestamp},{tx digest}`,
/// but nothing here depends on it.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(String);

impl SortKey {
    /// Create a sort key from its string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The sentinel position of a contract's declared initial state.
    ///
    /// The empty string sorts strictly before every producer key, so the
    /// genesis snapshot is always the nearest match of last resort.
    pub fn genesis() -> Self {
        Self(String::new())
    }

    /// Whether this is the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        self.0.is_empty()
    }

    /// String form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte form of the key, as stored in composite cache keys.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for SortKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for SortKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_genesis() {
            write!(f, "SortKey(genesis)")
        } else {
            write!(f, "SortKey({})", self.0)
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_genesis() {
            write!(f, "<genesis>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
