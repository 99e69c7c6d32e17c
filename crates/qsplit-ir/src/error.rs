//! Error types for the IR crate.

use crate::wire::WireId;
use thiserror::Error;

/// Errors that can occur while building or inspecting a circuit graph.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Wire not found in the graph.
    #[error("Wire {wire} not found in circuit{}", format_gate_context(.gate_name))]
    WireNotFound {
        /// The wire that was not found.
        wire: WireId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Wire added twice.
    #[error("Wire {0} already exists in circuit")]
    DuplicateWire(WireId),

    /// Gate requires a different number of wires.
    #[error("Gate '{gate_name}' requires {expected} wires, got {got}")]
    WireCountMismatch {
        /// Name of the gate.
        gate_name: String,
        /// Expected number of wires.
        expected: u32,
        /// Actual number of wires provided.
        got: u32,
    },

    /// The same wire appears twice in one operation.
    #[error("Duplicate wire {wire} in operation{}", format_gate_context(.gate_name))]
    DuplicateWireInOperation {
        /// The duplicate wire.
        wire: WireId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Invalid graph structure.
    #[error("Invalid circuit graph: {0}")]
    InvalidGraph(String),

    /// Circuit file could not be parsed.
    #[error("Failed to parse circuit: {0}")]
    Parse(#[from] serde_json::Error),
}

#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
