//! # State Evaluator
//!
//! The replay coordinator. Given a contract id and a target position it
//! finds the nearest cached snapshot at or before the target, loads only
//! the interactions past that snapshot, applies them in order and caches
//! a snapshot after each one. Evaluation cost is therefore proportional
//! to how far the log has moved since the last evaluation, not to the
//! length of the log.
//!
//! The evaluator is also the [`ContractHost`]: when contract code calls
//! into another contract mid-apply, the host runs a nested replay of the
//! callee up to the calling interaction's position on a grown call stack.

use crate::{
    ContractHost, DefinitionLoader, EngineError, EvalMode, EvaluationOptions, ExecutionContext,
    Executor, InteractionOutcome, InteractionsLoader, InternalWriteRequest, InternalWriteResponse,
};
use async_trait::async_trait;
use dashmap::DashMap;
use ratchet_cache::SortKeyCache;
use ratchet_types::{
    CacheEntry, CacheKey, CallStack, CallStackEntry, ContractDefinition, ContractId,
    EvalStateResult, Interaction, PruneStats, SortKey,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn, Level};

/// Replays interaction logs into contract states on top of a snapshot
/// cache.
///
/// # Concurrency
///
/// Top-level evaluations of the same contract are serialized on a
/// per-contract lock, so two concurrent `read_state` calls cannot
/// interleave their snapshot writes. Different contracts evaluate in
/// parallel. Maintenance operations that remove entries (`prune`,
/// `delete_contract`) take a writer gate that waits out every in-flight
/// evaluation and blocks new ones until the removal is done.
///
/// Nested evaluations triggered through the host run entirely inside
/// their caller's gate hold and take no locks of their own. The gate is
/// write-preferring, so a nested re-acquisition could wedge behind a
/// queued maintenance writer; the per-contract locks would likewise
/// invert between two cross-calling contracts.
pub struct StateEvaluator<State> {
    cache: Arc<dyn SortKeyCache<EvalStateResult<State>>>,
    interactions: Arc<dyn InteractionsLoader>,
    definitions: Arc<dyn DefinitionLoader<State>>,
    executor: Arc<dyn Executor<State>>,
    options: EvaluationOptions,
    /// Definitions are immutable per id, so the first load is kept for
    /// the lifetime of the evaluator.
    definitions_cache: DashMap<ContractId, Arc<ContractDefinition<State>>>,
    eval_locks: DashMap<ContractId, Arc<Mutex<()>>>,
    maintenance_gate: RwLock<()>,
}

impl<State> StateEvaluator<State>
where
    State: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an evaluator over the given cache, loaders and executor.
    pub fn new(
        cache: Arc<dyn SortKeyCache<EvalStateResult<State>>>,
        interactions: Arc<dyn InteractionsLoader>,
        definitions: Arc<dyn DefinitionLoader<State>>,
        executor: Arc<dyn Executor<State>>,
        options: EvaluationOptions,
    ) -> Self {
        Self {
            cache,
            interactions,
            definitions,
            executor,
            options,
            definitions_cache: DashMap::new(),
            eval_locks: DashMap::new(),
            maintenance_gate: RwLock::new(()),
        }
    }

    /// Active evaluation policy.
    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Evaluate `contract_id` at `target`, or at the tip of its log when
    /// `target` is `None`.
    ///
    /// Persists a snapshot after every applied interaction, so a repeated
    /// call with an unchanged log is answered from the cache alone. Pass
    /// an empty `stack` for a top-level evaluation; a non-empty stack
    /// marks a resumed nested flow and skips the per-contract lock, which
    /// the enclosing top-level call already holds.
    #[instrument(level = Level::DEBUG, skip_all, fields(contract = %contract_id, latency_us = tracing::field::Empty))]
    pub async fn read_state(
        &self,
        contract_id: &ContractId,
        target: Option<&SortKey>,
        stack: &CallStack,
    ) -> Result<CacheEntry<EvalStateResult<State>>, EngineError> {
        let start = Instant::now();
        let result = if stack.is_empty() {
            let _evaluations = self.maintenance_gate.read().await;
            let lock = self.eval_lock(contract_id);
            let _serial = lock.lock().await;
            self.replay(contract_id, target, stack, EvalMode::Commit)
                .await
        } else {
            self.replay(contract_id, target, stack, EvalMode::Commit)
                .await
        };
        let span = tracing::Span::current();
        span.record("latency_us", start.elapsed().as_micros() as u64);
        result
    }

    /// Evaluate without writing anything to the cache.
    ///
    /// Reads whatever snapshots earlier committed evaluations left
    /// behind. With `strict` set, internal-write rejections escalate
    /// exactly as they would in a committed evaluation; otherwise they
    /// are always handed back to the calling contract's code.
    pub async fn read_state_dry(
        &self,
        contract_id: &ContractId,
        target: Option<&SortKey>,
        stack: &CallStack,
        strict: bool,
    ) -> Result<CacheEntry<EvalStateResult<State>>, EngineError> {
        let _evaluations = self.maintenance_gate.read().await;
        self.replay(contract_id, target, stack, EvalMode::Dry { strict })
            .await
    }

    async fn replay(
        &self,
        contract_id: &ContractId,
        target: Option<&SortKey>,
        stack: &CallStack,
        mode: EvalMode,
    ) -> Result<CacheEntry<EvalStateResult<State>>, EngineError> {
        let cached = match target {
            Some(target) => self.cache.get_less_or_equal(contract_id, target).await?,
            None => self.cache.get_last(contract_id).await?,
        };

        let (mut position, mut result, from) = match cached {
            Some(entry) if target.is_some_and(|target| entry.sort_key == *target) => {
                debug!(contract = %contract_id, sort_key = %entry.sort_key, "exact cache hit");
                return Ok(entry);
            }
            Some(entry) => {
                let from = entry.sort_key.clone();
                (entry.sort_key, entry.value, Some(from))
            }
            None => {
                let definition = self.definition(contract_id).await?;
                let result = EvalStateResult::new(definition.init_state.clone());
                (SortKey::genesis(), result, None)
            }
        };

        let interactions = self
            .interactions
            .load(contract_id, from.as_ref(), target)
            .await?;

        if interactions.is_empty() {
            // An untouched contract still gets its initial state cached,
            // under the genesis sentinel, so the next read is a pure hit.
            if from.is_none() && mode.commits() {
                self.cache
                    .put(
                        &CacheKey::new(contract_id.clone(), position.clone()),
                        &result,
                    )
                    .await?;
            }
            return Ok(CacheEntry::new(position, result));
        }

        debug!(
            contract = %contract_id,
            from = %position,
            count = interactions.len(),
            "replaying interactions"
        );
        let definition = self.definition(contract_id).await?;

        for interaction in &interactions {
            if result.is_resolved(&interaction.id) {
                // Settled by an earlier nested write at this position;
                // the recorded outcome stands.
                continue;
            }

            let ctx = ExecutionContext {
                host: self,
                contract_id,
                interaction,
                stack,
                options: &self.options,
                mode,
            };
            match self
                .executor
                .apply(&definition, &result, interaction, &ctx)
                .await
            {
                Ok(InteractionOutcome::Applied { state }) => {
                    result.state = state;
                    result.mark_valid(&interaction.id);
                }
                Ok(InteractionOutcome::Rejected { message }) => {
                    debug!(
                        contract = %contract_id,
                        interaction = %interaction.id,
                        %message,
                        "interaction rejected"
                    );
                    result.mark_invalid(&interaction.id, message);
                }
                Err(err @ EngineError::InternalWriteRejected { .. }) => {
                    // An escalated callee rejection fails this interaction
                    // only; the replay carries on.
                    warn!(
                        contract = %contract_id,
                        interaction = %interaction.id,
                        %err,
                        "interaction failed"
                    );
                    result.mark_invalid(&interaction.id, err.to_string());
                }
                Err(err) => return Err(err),
            }

            position = interaction.sort_key.clone();
            if mode.commits() {
                self.cache
                    .put(
                        &CacheKey::new(contract_id.clone(), position.clone()),
                        &result,
                    )
                    .await?;
            }
        }

        Ok(CacheEntry::new(position, result))
    }

    async fn definition(
        &self,
        contract_id: &ContractId,
    ) -> Result<Arc<ContractDefinition<State>>, EngineError> {
        if let Some(definition) = self.definitions_cache.get(contract_id) {
            return Ok(Arc::clone(&definition));
        }
        let loaded = Arc::new(self.definitions.load(contract_id).await?);
        // Two tasks may race the first load; whichever insert lands first
        // is the one everybody keeps.
        let definition = self.definitions_cache.entry(contract_id.clone()).or_insert(loaded);
        Ok(Arc::clone(&definition))
    }

    fn eval_lock(&self, contract_id: &ContractId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.eval_locks.get(contract_id) {
            return Arc::clone(&lock);
        }
        let lock = self.eval_locks.entry(contract_id.clone()).or_default();
        Arc::clone(&lock)
    }

    fn check_reentry(
        &self,
        ctx: &ExecutionContext<'_, State>,
        callee: &ContractId,
    ) -> Result<(), EngineError> {
        if callee == ctx.contract_id || ctx.stack.contains_contract(callee) {
            return Err(EngineError::CyclicCall {
                callee: callee.clone(),
                stack: ctx.stack.clone(),
            });
        }
        if ctx.stack.depth() >= ctx.options.max_call_depth {
            return Err(EngineError::CallDepthExceeded {
                max: ctx.options.max_call_depth,
                stack: ctx.stack.clone(),
            });
        }
        Ok(())
    }

    /// Drop all but the `entries_stored` newest snapshots of every
    /// contract. Waits out in-flight evaluations and holds new ones back
    /// while entries are removed.
    pub async fn prune(&self, entries_stored: usize) -> Result<PruneStats, EngineError> {
        let _exclusive = self.maintenance_gate.write().await;
        Ok(self.cache.prune(entries_stored).await?)
    }

    /// Remove every snapshot of one contract, along with its evaluation
    /// lock. The next evaluation starts over from the definition's
    /// initial state.
    pub async fn delete_contract(&self, contract_id: &ContractId) -> Result<(), EngineError> {
        let _exclusive = self.maintenance_gate.write().await;
        self.eval_locks.remove(contract_id);
        Ok(self.cache.delete(contract_id).await?)
    }

    /// Ids of every contract with at least one cached snapshot.
    pub async fn all_contracts(&self) -> Result<Vec<ContractId>, EngineError> {
        Ok(self.cache.all_contracts().await?)
    }

    /// Every cached snapshot, in key order.
    pub async fn dump(&self) -> Result<Vec<(CacheKey, EvalStateResult<State>)>, EngineError> {
        Ok(self.cache.dump().await?)
    }

    /// Total number of cached snapshots across all contracts.
    pub async fn get_num_entries(&self) -> Result<usize, EngineError> {
        Ok(self.cache.get_num_entries().await?)
    }

    /// The highest sort key cached for any contract.
    pub async fn get_last_sort_key(&self) -> Result<Option<SortKey>, EngineError> {
        Ok(self.cache.get_last_sort_key().await?)
    }

    /// Flush the underlying cache to durable storage.
    pub async fn flush(&self) -> Result<(), EngineError> {
        Ok(self.cache.flush().await?)
    }
}

/// Wrap a nested failure with the position of the interaction that
/// triggered it.
fn nested_error<State>(ctx: &ExecutionContext<'_, State>, source: EngineError) -> EngineError {
    EngineError::Nested {
        contract_id: ctx.contract_id.clone(),
        interaction_id: ctx.interaction.id.clone(),
        source: Box::new(source),
    }
}

#[async_trait]
impl<State> ContractHost<State> for StateEvaluator<State>
where
    State: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn internal_write(
        &self,
        ctx: &ExecutionContext<'_, State>,
        request: InternalWriteRequest,
    ) -> Result<InternalWriteResponse<State>, EngineError> {
        if !ctx.options.internal_writes {
            return Err(EngineError::InternalWritesDisabled);
        }
        self.check_reentry(ctx, &request.callee_id)?;

        let trigger = ctx.interaction;
        let nested_stack = ctx
            .stack
            .push(CallStackEntry::new(ctx.contract_id.clone(), trigger.id.clone()));
        debug!(
            caller = %ctx.contract_id,
            callee = %request.callee_id,
            sort_key = %trigger.sort_key,
            "internal write"
        );

        // Bring the callee up to the trigger's position first; the write
        // applies on top of everything the callee's own log says by then.
        let entry = self
            .replay(
                &request.callee_id,
                Some(&trigger.sort_key),
                &nested_stack,
                ctx.mode,
            )
            .await
            .map_err(|err| nested_error(ctx, err))?;
        let mut callee_result = entry.value;

        let (ok, message) = if callee_result.is_resolved(&trigger.id) {
            // The callee's log already carried this write (an indexed
            // internal-write interaction); its replayed outcome stands.
            (
                callee_result
                    .validity
                    .get(&trigger.id)
                    .copied()
                    .unwrap_or(false),
                callee_result.error_messages.get(&trigger.id).cloned(),
            )
        } else {
            let synthesized = Interaction {
                id: trigger.id.clone(),
                sort_key: trigger.sort_key.clone(),
                caller: Some(ctx.contract_id.clone()),
                input: request.input.clone(),
            };
            let definition = self
                .definition(&request.callee_id)
                .await
                .map_err(|err| nested_error(ctx, err))?;
            let nested_ctx = ExecutionContext {
                host: self,
                contract_id: &request.callee_id,
                interaction: &synthesized,
                stack: &nested_stack,
                options: ctx.options,
                mode: ctx.mode,
            };
            let outcome = self
                .executor
                .apply(&definition, &callee_result, &synthesized, &nested_ctx)
                .await
                .map_err(|err| nested_error(ctx, err))?;

            let (ok, message) = match outcome {
                InteractionOutcome::Applied { state } => {
                    callee_result.state = state;
                    callee_result.mark_valid(&trigger.id);
                    (true, None)
                }
                InteractionOutcome::Rejected { message } => {
                    callee_result.mark_invalid(&trigger.id, message.clone());
                    (false, Some(message))
                }
            };

            // The outcome is persisted either way; escalation changes what
            // the caller sees, never what the callee's namespace records.
            if ctx.mode.commits() {
                self.cache
                    .put(
                        &CacheKey::new(request.callee_id.clone(), trigger.sort_key.clone()),
                        &callee_result,
                    )
                    .await?;
            }
            (ok, message)
        };

        let throw_on_error = request
            .throw_on_error
            .unwrap_or(ctx.options.throw_on_internal_write_error);
        if !ok && throw_on_error && ctx.mode.escalates() {
            return Err(EngineError::InternalWriteRejected {
                callee: request.callee_id,
                message: message.unwrap_or_default(),
            });
        }

        Ok(InternalWriteResponse {
            ok,
            error_message: message,
            state: callee_result.state,
        })
    }

    async fn read_foreign_state(
        &self,
        ctx: &ExecutionContext<'_, State>,
        other_id: &ContractId,
    ) -> Result<CacheEntry<EvalStateResult<State>>, EngineError> {
        self.check_reentry(ctx, other_id)?;

        let nested_stack = ctx.stack.push(CallStackEntry::new(
            ctx.contract_id.clone(),
            ctx.interaction.id.clone(),
        ));
        self.replay(
            other_id,
            Some(&ctx.interaction.sort_key),
            &nested_stack,
            ctx.mode,
        )
        .await
        .map_err(|err| nested_error(ctx, err))
    }
}
