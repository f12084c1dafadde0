//! Shared test helpers for cache backend tests.
//!
//! Provides reusable builders for snapshot values and pre-populated
//! namespaces so that cache-memory and cache-rocksdb tests can share a
//! single source of truth.

use crate::{CacheError, SortKeyCache};
use ratchet_types::{CacheKey, EvalStateResult, InteractionId};
use serde_json::{json, Value};

/// Build a minimal snapshot value carrying a counter.
pub fn snapshot(n: u64) -> Value {
    json!({ "n": n })
}

/// Build an `EvalStateResult` around [`snapshot`] with one recorded outcome
/// per applied interaction id.
pub fn eval_result(n: u64, applied: &[&str]) -> EvalStateResult<Value> {
    let mut result = EvalStateResult::new(snapshot(n));
    for id in applied {
        result.mark_valid(&InteractionId::new(*id));
    }
    result
}

/// Put a series of `(sort_key, counter)` snapshots into one namespace.
pub async fn put_series<C>(
    cache: &C,
    contract_id: &str,
    series: &[(&str, u64)],
) -> Result<(), CacheError>
where
    C: SortKeyCache<Value>,
{
    for (sort_key, n) in series {
        cache
            .put(&CacheKey::new(contract_id, *sort_key), &snapshot(*n))
            .await?;
    }
    Ok(())
}

/// The worked example used across backends: two snapshots in namespace `C1`.
///
/// `"000003" -> {n:1}` and `"000007" -> {n:2}`.
pub async fn put_example_namespace<C>(cache: &C) -> Result<(), CacheError>
where
    C: SortKeyCache<Value>,
{
    put_series(cache, "C1", &[("000003", 1), ("000007", 2)]).await
}
