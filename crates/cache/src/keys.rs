//! Helper functions for the composite key layout shared by cache
//! implementations.
//!
//! A stored key is `contract_id bytes ++ 0x00 ++ sort_key bytes`. Contract
//! ids must not contain NUL (a documented producer precondition), so the
//! first NUL unambiguously splits a stored key back into its parts, and all
//! keys of one namespace form one contiguous byte range. Within that range,
//! byte order equals `SortKey` order.

use ratchet_types::{CacheKey, ContractId, SortKey};

/// Separator between the namespace and the sort key.
pub const NAMESPACE_SEPARATOR: u8 = 0x00;

/// Build the stored key for a cache key.
pub fn to_storage_key(key: &CacheKey) -> Vec<u8> {
    let contract = key.contract_id.as_bytes();
    let sort_key = key.sort_key.as_bytes();
    let mut storage_key = Vec::with_capacity(contract.len() + 1 + sort_key.len());
    storage_key.extend_from_slice(contract);
    storage_key.push(NAMESPACE_SEPARATOR);
    storage_key.extend_from_slice(sort_key);
    storage_key
}

/// Build the key prefix covering one contract's namespace.
///
/// The genesis entry (empty sort key) is stored at exactly this prefix, so a
/// `[prefix, next_prefix)` scan covers the whole namespace including genesis.
pub fn namespace_prefix(contract_id: &ContractId) -> Vec<u8> {
    let contract = contract_id.as_bytes();
    let mut prefix = Vec::with_capacity(contract.len() + 1);
    prefix.extend_from_slice(contract);
    prefix.push(NAMESPACE_SEPARATOR);
    prefix
}

/// Compute the exclusive end key for a prefix scan.
///
/// Returns `None` if the prefix is all `0xFF` bytes (no valid exclusive upper
/// bound). In practice this never happens: namespace prefixes end in the NUL
/// separator.
pub fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    debug_assert!(!prefix.is_empty(), "next_prefix called with empty prefix");
    let mut next = prefix.to_vec();
    for i in (0..next.len()).rev() {
        if next[i] < 255 {
            next[i] += 1;
            return Some(next);
        }
        next[i] = 0;
    }
    None
}

/// Split a stored key back into its cache key, at the first NUL.
///
/// Returns `None` for keys that were not produced by [`to_storage_key`].
pub fn split_storage_key(storage_key: &[u8]) -> Option<CacheKey> {
    let separator = storage_key
        .iter()
        .position(|&b| b == NAMESPACE_SEPARATOR)?;
    let contract_id = std::str::from_utf8(&storage_key[..separator]).ok()?;
    let sort_key = std::str::from_utf8(&storage_key[separator + 1..]).ok()?;
    Some(CacheKey::new(contract_id, sort_key))
}

/// The sort-key suffix of a stored key, for global maximum scans.
pub fn sort_key_suffix(storage_key: &[u8]) -> Option<SortKey> {
    split_storage_key(storage_key).map(|key| key.sort_key)
}
