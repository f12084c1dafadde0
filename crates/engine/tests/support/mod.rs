//! Shared test doubles: an in-memory ledger, a static definition registry
//! and a small JSON interpreter, wired into a real evaluator over the
//! in-memory cache backend.
//!
//! The interpreter reads one verb per interaction input:
//!
//! - `{"add": n}`: add `n` to the numeric `counter` field
//! - `{"reject": msg}`: deterministic rejection
//! - `{"fault": msg}`: execution fault, aborts the replay
//! - `{"write": {"target": id, "input": {..}, "throw_on_error": bool?}}`:
//!   internal write, folding the host response into the outcome
//! - `{"read": id}`: foreign read, copying the target's `counter` into
//!   the caller's `observed` field

#![allow(dead_code)]

use async_trait::async_trait;
use ratchet_engine::{
    open_sort_key_cache, CacheOptions, ContractHost, DefinitionLoader, EngineError,
    EvaluationOptions, Executor, ExecutionContext, InteractionOutcome, InteractionsLoader,
    InternalWriteRequest, LoaderError, SortKeyCache, StateEvaluator,
};
use ratchet_types::{
    ContractDefinition, ContractId, ContractSource, EvalStateResult, Interaction, SortKey,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Contract state used throughout the engine tests.
pub type State = Value;

/// Interaction log served from memory, with call accounting.
pub struct MemoryLedger {
    logs: BTreeMap<ContractId, Vec<Interaction>>,
    pub load_calls: AtomicUsize,
}

impl MemoryLedger {
    pub fn new(logs: BTreeMap<ContractId, Vec<Interaction>>) -> Self {
        Self {
            logs,
            load_calls: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractionsLoader for MemoryLedger {
    async fn load(
        &self,
        contract_id: &ContractId,
        from_exclusive: Option<&SortKey>,
        to_inclusive: Option<&SortKey>,
    ) -> Result<Vec<Interaction>, LoaderError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let log = self.logs.get(contract_id).cloned().unwrap_or_default();
        Ok(log
            .into_iter()
            .filter(|interaction| {
                from_exclusive.is_none_or(|from| interaction.sort_key > *from)
                    && to_inclusive.is_none_or(|to| interaction.sort_key <= *to)
            })
            .collect())
    }
}

/// Definition registry answering from a fixed map.
pub struct StaticDefinitions {
    definitions: BTreeMap<ContractId, ContractDefinition<State>>,
    pub load_calls: AtomicUsize,
}

impl StaticDefinitions {
    pub fn new(definitions: BTreeMap<ContractId, ContractDefinition<State>>) -> Self {
        Self {
            definitions,
            load_calls: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DefinitionLoader<State> for StaticDefinitions {
    async fn load(
        &self,
        contract_id: &ContractId,
    ) -> Result<ContractDefinition<State>, LoaderError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.definitions
            .get(contract_id)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound {
                contract_id: contract_id.clone(),
            })
    }
}

/// The JSON interpreter, with an optional artificial delay per apply to
/// widen race windows in concurrency tests.
pub struct JsonExecutor {
    pub apply_calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl JsonExecutor {
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            apply_calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn applies(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor<State> for JsonExecutor {
    async fn apply(
        &self,
        _definition: &ContractDefinition<State>,
        current: &EvalStateResult<State>,
        interaction: &Interaction,
        ctx: &ExecutionContext<'_, State>,
    ) -> Result<InteractionOutcome<State>, EngineError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let input = &interaction.input;

        if let Some(n) = input.get("add").and_then(Value::as_i64) {
            let mut state = current.state.clone();
            let counter = state.get("counter").and_then(Value::as_i64).unwrap_or(0);
            state["counter"] = json!(counter + n);
            if let Some(caller) = &interaction.caller {
                state["last_caller"] = json!(caller.as_str());
            }
            return Ok(InteractionOutcome::Applied { state });
        }

        if let Some(message) = input.get("reject").and_then(Value::as_str) {
            return Ok(InteractionOutcome::Rejected {
                message: message.to_string(),
            });
        }

        if let Some(message) = input.get("fault").and_then(Value::as_str) {
            return Err(EngineError::ExecutionFault {
                contract_id: ctx.contract_id.clone(),
                interaction_id: interaction.id.clone(),
                message: message.to_string(),
            });
        }

        if let Some(write) = input.get("write") {
            let target = write
                .get("target")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mut request = InternalWriteRequest::new(
                target,
                write.get("input").cloned().unwrap_or(Value::Null),
            );
            request.throw_on_error = write.get("throw_on_error").and_then(Value::as_bool);
            let response = ctx.host.internal_write(ctx, request).await?;
            if response.ok {
                let mut state = current.state.clone();
                let writes = state.get("writes").and_then(Value::as_i64).unwrap_or(0);
                state["writes"] = json!(writes + 1);
                return Ok(InteractionOutcome::Applied { state });
            }
            return Ok(InteractionOutcome::Rejected {
                message: format!(
                    "write refused: {}",
                    response.error_message.unwrap_or_default()
                ),
            });
        }

        if let Some(target) = input.get("read").and_then(Value::as_str) {
            let target = ContractId::new(target);
            let entry = ctx.host.read_foreign_state(ctx, &target).await?;
            let mut state = current.state.clone();
            state["observed"] = entry
                .value
                .state
                .get("counter")
                .cloned()
                .unwrap_or(Value::Null);
            return Ok(InteractionOutcome::Applied { state });
        }

        Ok(InteractionOutcome::Rejected {
            message: format!("unknown input: {input}"),
        })
    }
}

/// A definition whose initial state is a zeroed counter object.
pub fn definition(id: &str) -> ContractDefinition<State> {
    ContractDefinition {
        contract_id: ContractId::new(id),
        owner: Some("test-owner".to_string()),
        init_state: json!({ "counter": 0 }),
        source: ContractSource::Script {
            src: "handle(state, interaction)".to_string(),
        },
    }
}

pub fn interaction(id: &str, sort_key: &str, input: Value) -> Interaction {
    Interaction::new(id, sort_key, input)
}

/// The evaluator under test plus handles to its collaborators.
pub struct Harness {
    pub evaluator: Arc<StateEvaluator<State>>,
    pub cache: Arc<dyn SortKeyCache<EvalStateResult<State>>>,
    pub ledger: Arc<MemoryLedger>,
    pub definitions: Arc<StaticDefinitions>,
    pub executor: Arc<JsonExecutor>,
}

pub struct HarnessBuilder {
    logs: BTreeMap<ContractId, Vec<Interaction>>,
    definitions: BTreeMap<ContractId, ContractDefinition<State>>,
    options: EvaluationOptions,
    delay: Option<Duration>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            logs: BTreeMap::new(),
            definitions: BTreeMap::new(),
            options: EvaluationOptions::default(),
            delay: None,
        }
    }

    /// Register a contract with the default zeroed-counter definition.
    pub fn contract(mut self, id: &str) -> Self {
        self.definitions.insert(ContractId::new(id), definition(id));
        self
    }

    pub fn log(mut self, id: &str, interactions: Vec<Interaction>) -> Self {
        self.logs.insert(ContractId::new(id), interactions);
        self
    }

    pub fn options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    /// Enable internal writes, leaving the other options at defaults.
    pub fn internal_writes(mut self) -> Self {
        self.options.internal_writes = true;
        self
    }

    pub fn apply_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> Harness {
        let cache = open_sort_key_cache(&CacheOptions::in_memory())
            .expect("in-memory cache always opens");
        let ledger = Arc::new(MemoryLedger::new(self.logs));
        let definitions = Arc::new(StaticDefinitions::new(self.definitions));
        let executor = Arc::new(JsonExecutor::new(self.delay));
        let evaluator = Arc::new(StateEvaluator::new(
            Arc::clone(&cache),
            Arc::clone(&ledger) as Arc<dyn InteractionsLoader>,
            Arc::clone(&definitions) as Arc<dyn DefinitionLoader<State>>,
            Arc::clone(&executor) as Arc<dyn Executor<State>>,
            self.options,
        ));
        Harness {
            evaluator,
            cache,
            ledger,
            definitions,
            executor,
        }
    }
}

/// Follow the chain of nested-evaluation wrappers down to the root cause.
pub fn root_cause(err: &EngineError) -> &EngineError {
    let mut current = err;
    while let EngineError::Nested { source, .. } = current {
        current = source.as_ref();
    }
    current
}

pub fn counter_of(result: &EvalStateResult<State>) -> i64 {
    result
        .state
        .get("counter")
        .and_then(Value::as_i64)
        .unwrap_or(0)
}
