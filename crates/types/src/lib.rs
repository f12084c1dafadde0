//! Core types for the ratchet contract-state cache and replay engine.
//!
//! This crate provides the foundational types used throughout the
//! implementation:
//!
//! - **Ordering**: [`SortKey`], the lexicographic ordering token for
//!   interactions and cached snapshots
//! - **Identifiers**: [`ContractId`], [`InteractionId`]
//! - **Cache types**: [`CacheKey`], [`CacheEntry`], [`PruneStats`]
//! - **Evaluation types**: [`EvalStateResult`], [`Interaction`],
//!   [`ContractDefinition`], [`CallStack`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

#![warn(missing_docs)]

mod call_stack;
mod eval;
mod ids;
mod interaction;
mod sort_key;

// Cache-facing types
mod cache;

pub use cache::{CacheEntry, CacheKey, PruneStats};
pub use call_stack::{CallStack, CallStackEntry};
pub use eval::EvalStateResult;
pub use ids::{ContractId, InteractionId};
pub use interaction::{ContractDefinition, ContractSource, Interaction};
pub use sort_key::SortKey;
