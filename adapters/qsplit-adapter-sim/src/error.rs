//! Simulator errors.

use qsplit_cut::ExecutionError;
use thiserror::Error;

/// Errors raised while simulating a circuit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// The circuit contains a gate without known semantics.
    #[error("Gate '{0}' cannot be simulated")]
    UnsupportedGate(String),

    /// The circuit is wider than the simulator allows.
    #[error("Circuit has {wires} wires, simulator supports at most {max}")]
    TooLarge {
        /// Wires in the circuit.
        wires: usize,
        /// Simulator limit.
        max: usize,
    },

    /// An operation references a wire the circuit does not declare.
    #[error("Operation '{gate}' references unknown wire {wire}")]
    UnknownWire {
        /// Gate name.
        gate: String,
        /// The wire.
        wire: String,
    },
}

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;

impl From<SimError> for ExecutionError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::UnsupportedGate(name) => {
                ExecutionError::Unsupported(format!("gate '{name}'"))
            }
            SimError::TooLarge { wires, max } => ExecutionError::TooLarge { wires, max },
            other @ SimError::UnknownWire { .. } => ExecutionError::Backend(other.to_string()),
        }
    }
}
