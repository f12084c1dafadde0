//! # Ratchet Engine
//!
//! Cached, incremental evaluation of ledger-anchored contract state.
//!
//! A contract's state is fully determined by its definition plus the
//! ordered log of interactions recorded against it. Evaluating from
//! genesis on every read does not scale, so the engine replays the log on
//! top of cached snapshots: each evaluation starts from the newest
//! snapshot at or before the requested position and applies only the
//! interactions past it, caching a snapshot after every one.
//!
//! # Architecture
//!
//! ```text
//!  read_state(contract, target)
//!        │
//!        ▼
//!  ┌─────────────┐  nearest snapshot ≤ target   ┌──────────────┐
//!  │StateEvaluator│ ◄───────────────────────────│ SortKeyCache │
//!  └─────────────┘                              └──────────────┘
//!        │  missing slice of the log                    ▲
//!        ▼                                              │ snapshot per
//!  ┌─────────────┐    one interaction at a time         │ interaction
//!  │   loaders   │ ─────────► Executor ─────────────────┘
//!  └─────────────┘               │
//!                                ▼ internal write / foreign read
//!                          ContractHost ──► nested replay of the callee
//! ```
//!
//! The evaluator reaches the outside world only through traits:
//! [`InteractionsLoader`] and [`DefinitionLoader`] answer from whatever
//! indexes the ledger, [`Executor`] runs contract code, and the cache is
//! any [`SortKeyCache`] backend ([`open_sort_key_cache`] builds the
//! bundled in-memory or RocksDB one).
//!
//! # Example
//!
//! ```ignore
//! let cache = open_sort_key_cache(&CacheOptions::in_memory())?;
//! let evaluator = StateEvaluator::new(
//!     cache,
//!     interactions,
//!     definitions,
//!     executor,
//!     EvaluationOptions::default(),
//! );
//! let entry = evaluator
//!     .read_state(&contract_id, None, &CallStack::new())
//!     .await?;
//! println!("state at {}: {:?}", entry.sort_key, entry.value.state);
//! ```

#![warn(missing_docs)]

mod error;
mod evaluator;
mod options;
mod storage;
mod traits;

pub use error::{EngineError, LoaderError};
pub use evaluator::StateEvaluator;
pub use options::{EvalMode, EvaluationOptions, DEFAULT_MAX_CALL_DEPTH};
pub use storage::open_sort_key_cache;
pub use traits::{
    ContractHost, DefinitionLoader, ExecutionContext, Executor, InteractionOutcome,
    InteractionsLoader, InternalWriteRequest, InternalWriteResponse,
};

// Re-export the cache surface an integration needs alongside the engine.
pub use ratchet_cache::{CacheError, CacheOptions, SortKeyCache};
