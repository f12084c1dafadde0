//! Evaluation policy knobs.

/// Nesting limit applied when the options do not override it.
///
/// Counts frames already on the stack, so a chain of three contracts deep
/// evaluates and the fourth hop is refused.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 3;

/// Policy applied to every evaluation performed by one evaluator.
///
/// These mirror the per-deployment switches of the reference gateway
/// stack: inner contract calls are opt-in, and a rejected inner write
/// fails the calling interaction unless the caller opts out per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Allow contracts to write to other contracts during replay.
    pub internal_writes: bool,
    /// When a callee rejects an internal write, fail the calling
    /// interaction instead of handing the rejection back to contract code.
    /// A request-level override takes precedence over this.
    pub throw_on_internal_write_error: bool,
    /// Maximum number of frames allowed on the call stack before a nested
    /// call is refused.
    pub max_call_depth: usize,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            internal_writes: false,
            throw_on_internal_write_error: true,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// How an evaluation interacts with the snapshot cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Persist a snapshot after every applied interaction.
    Commit,
    /// Read existing snapshots, write nothing.
    Dry {
        /// Apply commit-mode escalation rules to internal-write
        /// rejections even though nothing is persisted.
        strict: bool,
    },
}

impl EvalMode {
    /// Whether this mode persists snapshots.
    pub fn commits(self) -> bool {
        matches!(self, EvalMode::Commit)
    }

    /// Whether internal-write rejections may escalate into the caller.
    pub fn escalates(self) -> bool {
        match self {
            EvalMode::Commit => true,
            EvalMode::Dry { strict } => strict,
        }
    }
}
