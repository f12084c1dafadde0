//! Logged interactions and contract definitions.

use crate::{ContractId, InteractionId, SortKey};
use serde::{Deserialize, Serialize};

/// One logged input event to a contract.
///
/// Interactions arrive from the ledger (or an indexing gateway) as an
/// append-only log ordered by [`SortKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Ledger identity of the interaction.
    pub id: InteractionId,
    /// Position of the interaction in the log.
    pub sort_key: SortKey,
    /// The contract that triggered this interaction, for interactions
    /// synthesized by internal writes. `None` for direct ledger inputs.
    pub caller: Option<ContractId>,
    /// The input handed to the contract's entry point.
    pub input: serde_json::Value,
}

impl Interaction {
    /// Create a direct ledger interaction.
    pub fn new(
        id: impl Into<InteractionId>,
        sort_key: impl Into<SortKey>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            sort_key: sort_key.into(),
            caller: None,
            input,
        }
    }
}

/// Executable source of a contract, as the definition loader supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractSource {
    /// Script source evaluated by a sandboxing executor.
    Script {
        /// The source text.
        src: String,
    },
    /// A compiled module executed by a module runtime.
    Module {
        /// The module bytes, hex-encoded in JSON form.
        #[serde(with = "hex")]
        bytes: Vec<u8>,
    },
}

/// A contract's executable code, metadata and declared initial state.
///
/// Loaded once per contract id; the ordering position never changes it. The
/// replay engine itself only reads `init_state`, the rest is consumed by
/// executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDefinition<State> {
    /// The contract this definition belongs to.
    pub contract_id: ContractId,
    /// Deploying wallet address, when the ledger records one.
    pub owner: Option<String>,
    /// The declared initial state, before any interaction.
    pub init_state: State,
    /// The executable source.
    pub source: ContractSource,
}
