//! Capability traits at the edges of the evaluator.
//!
//! The evaluator owns the replay algorithm and nothing else. Everything it
//! needs from the outside world comes through one of these traits:
//!
//! - [`InteractionsLoader`]: the ordered interaction log
//! - [`DefinitionLoader`]: contract code and initial state
//! - [`Executor`]: applies one interaction to one state
//! - [`ContractHost`]: services the executor calls back into mid-apply
//!
//! The first three are implemented by integrations (gateways, indexers,
//! language runtimes). `ContractHost` is implemented by the evaluator
//! itself and handed to the executor through [`ExecutionContext`], which
//! is how inner contract calls re-enter the replay machinery.

use crate::{EngineError, EvalMode, EvaluationOptions, LoaderError};
use async_trait::async_trait;
use ratchet_types::{
    CacheEntry, CallStack, ContractDefinition, ContractId, EvalStateResult, Interaction, SortKey,
};

/// Source of the ordered interaction log.
///
/// Implementations answer with every interaction of `contract_id` whose
/// sort key is strictly greater than `from_exclusive` and, when a bound is
/// given, at most `to_inclusive`, in ascending sort-key order. A `None`
/// lower bound means the full log from genesis.
#[async_trait]
pub trait InteractionsLoader: Send + Sync {
    /// Load a slice of the interaction log.
    async fn load(
        &self,
        contract_id: &ContractId,
        from_exclusive: Option<&SortKey>,
        to_inclusive: Option<&SortKey>,
    ) -> Result<Vec<Interaction>, LoaderError>;
}

/// Source of contract definitions.
///
/// A definition is immutable for a given id, so the evaluator memoizes
/// answers and calls this at most once per contract.
#[async_trait]
pub trait DefinitionLoader<State>: Send + Sync {
    /// Load the definition registered under `contract_id`.
    async fn load(&self, contract_id: &ContractId)
        -> Result<ContractDefinition<State>, LoaderError>;
}

/// Applies a single interaction to a contract state.
///
/// Implementations wrap a language runtime. An apply must be a pure
/// function of `(current, interaction)` plus whatever it reads through
/// `ctx.host`, so that replaying a log always reproduces the same states.
///
/// # Outcomes
///
/// Deterministic contract-level failures (bad input, guard violations) are
/// [`InteractionOutcome::Rejected`], which records the interaction as
/// invalid and keeps the replay going. `Err` is reserved for faults that
/// poison the whole replay, such as a crashed runtime.
#[async_trait]
pub trait Executor<State>: Send + Sync {
    /// Apply `interaction` on top of `current`.
    async fn apply(
        &self,
        definition: &ContractDefinition<State>,
        current: &EvalStateResult<State>,
        interaction: &Interaction,
        ctx: &ExecutionContext<'_, State>,
    ) -> Result<InteractionOutcome<State>, EngineError>;
}

/// Services a contract may invoke while one of its interactions is being
/// applied.
///
/// Both operations push a frame for the calling contract and evaluate the
/// target no further than the calling interaction's position, so an inner
/// read can never observe the future of another contract's log.
#[async_trait]
pub trait ContractHost<State>: Send + Sync {
    /// Apply a state-changing call to another contract and persist its
    /// outcome under the calling interaction's sort key.
    async fn internal_write(
        &self,
        ctx: &ExecutionContext<'_, State>,
        request: InternalWriteRequest,
    ) -> Result<InternalWriteResponse<State>, EngineError>;

    /// Evaluate another contract's state at the calling interaction's
    /// position, without writing to it.
    async fn read_foreign_state(
        &self,
        ctx: &ExecutionContext<'_, State>,
        other_id: &ContractId,
    ) -> Result<CacheEntry<EvalStateResult<State>>, EngineError>;
}

/// Everything an executor needs to know about the apply in progress.
///
/// Borrowed for the duration of a single [`Executor::apply`] call.
pub struct ExecutionContext<'a, State> {
    /// Host services, backed by the evaluator running the replay.
    pub host: &'a dyn ContractHost<State>,
    /// Contract whose interaction is being applied.
    pub contract_id: &'a ContractId,
    /// The interaction being applied.
    pub interaction: &'a Interaction,
    /// Call stack as of this apply. Empty for a top-level replay.
    pub stack: &'a CallStack,
    /// Active evaluation policy.
    pub options: &'a EvaluationOptions,
    /// Cache interaction mode of the enclosing evaluation.
    pub mode: EvalMode,
}

/// The deterministic result of applying one interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome<State> {
    /// The interaction was valid and produced a new state.
    Applied {
        /// State after the interaction.
        state: State,
    },
    /// The contract refused the interaction; state is unchanged.
    Rejected {
        /// The contract's complaint, recorded against the interaction.
        message: String,
    },
}

/// A contract's request to write to another contract.
#[derive(Debug, Clone)]
pub struct InternalWriteRequest {
    /// Target contract.
    pub callee_id: ContractId,
    /// Input handed to the target, in place of an input of its own log.
    pub input: serde_json::Value,
    /// Per-request override of
    /// [`EvaluationOptions::throw_on_internal_write_error`].
    pub throw_on_error: Option<bool>,
}

impl InternalWriteRequest {
    /// Request a write of `input` to `callee_id` under the active
    /// escalation policy.
    pub fn new(callee_id: impl Into<ContractId>, input: serde_json::Value) -> Self {
        Self {
            callee_id: callee_id.into(),
            input,
            throw_on_error: None,
        }
    }
}

/// Outcome of an internal write, as handed back to the calling contract
/// when the rejection was not escalated.
#[derive(Debug, Clone)]
pub struct InternalWriteResponse<State> {
    /// Whether the callee applied the write.
    pub ok: bool,
    /// The callee's recorded error message when it did not.
    pub error_message: Option<String>,
    /// The callee's state after the write settled, applied or not.
    pub state: State,
}
