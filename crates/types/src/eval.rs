//! Accumulated result of replaying an ordered prefix of a contract's log.

use crate::InteractionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contract state plus the per-interaction outcomes accumulated while
/// reaching it.
///
/// This whole structure is what gets cached after every applied interaction,
/// not just the bare state: `validity` records whether each replayed
/// interaction was applied (`true`) or deterministically rejected (`false`),
/// and `error_messages` keeps the rejection messages.
///
/// Both maps grow monotonically. Replay never rewrites an outcome that is
/// already recorded; later passes only add entries for interaction ids that
/// were unresolved when the snapshot was first written (internal-write
/// resolution is the one path that adds outcomes retroactively).
///
/// `BTreeMap` keeps the serialized snapshot bytes deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalStateResult<State> {
    /// The contract state after the replayed prefix.
    pub state: State,
    /// Interaction id -> applied (`true`) or rejected (`false`).
    pub validity: BTreeMap<InteractionId, bool>,
    /// Interaction id -> rejection message, for invalid interactions.
    pub error_messages: BTreeMap<InteractionId, String>,
}

impl<State> EvalStateResult<State> {
    /// Wrap a bare state with empty outcome maps.
    pub fn new(state: State) -> Self {
        Self {
            state,
            validity: BTreeMap::new(),
            error_messages: BTreeMap::new(),
        }
    }

    /// Whether an outcome for `id` is already recorded.
    pub fn is_resolved(&self, id: &InteractionId) -> bool {
        self.validity.contains_key(id)
    }

    /// Record a successful application of `id`.
    ///
    /// A no-op if `id` is already resolved; recorded outcomes are immutable.
    pub fn mark_valid(&mut self, id: &InteractionId) {
        self.validity.entry(id.clone()).or_insert(true);
    }

    /// Record a deterministic rejection of `id` with its message.
    ///
    /// A no-op if `id` is already resolved; recorded outcomes are immutable.
    pub fn mark_invalid(&mut self, id: &InteractionId, message: impl Into<String>) {
        if self.is_resolved(id) {
            return;
        }
        self.validity.insert(id.clone(), false);
        self.error_messages.insert(id.clone(), message.into());
    }
}
