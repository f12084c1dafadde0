//! Call stack for recursive inter-contract evaluation.

use crate::{ContractId, InteractionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One frame of an active recursive evaluation: the contract whose
/// interaction triggered a nested call, and that interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStackEntry {
    /// The calling contract.
    pub contract_id: ContractId,
    /// The interaction whose execution triggered the nested call.
    pub interaction_id: InteractionId,
}

impl CallStackEntry {
    /// Create a frame.
    pub fn new(
        contract_id: impl Into<ContractId>,
        interaction_id: impl Into<InteractionId>,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            interaction_id: interaction_id.into(),
        }
    }
}

/// The chain of frames currently being evaluated, outermost first.
///
/// The stack is passed by value through nested evaluations: [`CallStack::push`]
/// returns a new stack and never mutates the original, so sibling branches of
/// a recursive call tree cannot observe each other's frames. That makes cycle
/// detection a pure function of the stack a call receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStack {
    frames: Vec<CallStackEntry>,
}

impl CallStack {
    /// An empty stack, for top-level evaluations.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new stack with `entry` appended; `self` is unchanged.
    #[must_use]
    pub fn push(&self, entry: CallStackEntry) -> Self {
        let mut frames = self.frames.clone();
        frames.push(entry);
        Self { frames }
    }

    /// Current recursion depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether this is a top-level evaluation.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether `contract_id` already owns a frame on this stack.
    ///
    /// Nested evaluations only ever move to equal-or-earlier ordering
    /// positions, so revisiting any contract on the stack means evaluating it
    /// at or before a position that is still in flight: a cycle.
    pub fn contains_contract(&self, contract_id: &ContractId) -> bool {
        self.frames
            .iter()
            .any(|frame| &frame.contract_id == contract_id)
    }

    /// The frames, outermost first.
    pub fn frames(&self) -> &[CallStackEntry] {
        &self.frames
    }

    /// The innermost frame, if any.
    pub fn last(&self) -> Option<&CallStackEntry> {
        self.frames.last()
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return write!(f, "<top-level>");
        }
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}[{}]", frame.contract_id, frame.interaction_id)?;
        }
        Ok(())
    }
}
