//! Engine error types.

use ratchet_cache::CacheError;
use ratchet_types::{CallStack, ContractId, InteractionId};
use thiserror::Error;

/// Errors raised by the interaction and definition loaders.
///
/// Loaders talk to whatever indexes the ledger, so most failures here are
/// transient transport problems rather than contract-level faults.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The upstream gateway or index could not be reached or answered
    /// with garbage.
    #[error("gateway error: {message}")]
    Gateway {
        /// Transport-level detail.
        message: String,
    },

    /// No contract is registered under the requested id.
    #[error("contract {contract_id} not found")]
    NotFound {
        /// The id that missed.
        contract_id: ContractId,
    },

    /// The loader answered, but the payload did not parse.
    #[error("malformed loader response: {message}")]
    Malformed {
        /// Parse-level detail.
        message: String,
    },
}

/// Errors raised while evaluating contract state.
///
/// `ExecutionFault` aborts a replay outright; a rejected interaction does
/// not surface here at all, it is recorded in the evaluated result's
/// validity map instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The snapshot cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A loader failed.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Contract code failed in a way that is not a deterministic outcome
    /// of its input, so the replay cannot continue.
    #[error("execution fault in {contract_id} at {interaction_id}: {message}")]
    ExecutionFault {
        /// Contract being evaluated when the fault hit.
        contract_id: ContractId,
        /// Interaction being applied when the fault hit.
        interaction_id: InteractionId,
        /// Executor-reported detail.
        message: String,
    },

    /// An inner call targeted a contract already present in the call
    /// stack (or the calling contract itself).
    #[error("cyclic call to {callee} (stack: {stack})")]
    CyclicCall {
        /// Contract the cycle closed on.
        callee: ContractId,
        /// Stack at the point of the attempted call.
        stack: CallStack,
    },

    /// The call stack reached the configured nesting limit.
    #[error("call depth limit {max} exceeded (stack: {stack})")]
    CallDepthExceeded {
        /// Configured limit.
        max: usize,
        /// Stack at the point of the attempted call.
        stack: CallStack,
    },

    /// A contract attempted an internal write while the feature is
    /// switched off in the evaluation options.
    #[error("internal writes are disabled")]
    InternalWritesDisabled,

    /// A callee rejected an internal write and the active options escalate
    /// that rejection into the caller.
    #[error("internal write to {callee} rejected: {message}")]
    InternalWriteRejected {
        /// Contract that rejected the write.
        callee: ContractId,
        /// The callee's recorded error message.
        message: String,
    },

    /// A failure inside a nested evaluation, annotated with the caller's
    /// position so the full chain reads out of the error source chain.
    #[error("nested evaluation failed in {contract_id} at {interaction_id}")]
    Nested {
        /// Contract whose interaction triggered the nested call.
        contract_id: ContractId,
        /// Interaction that triggered the nested call.
        interaction_id: InteractionId,
        /// The inner failure.
        #[source]
        source: Box<EngineError>,
    },
}
