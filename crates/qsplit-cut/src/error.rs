//! Error types for the cutting engine.

use qsplit_ir::{IrError, WireId};
use thiserror::Error;

use crate::config::ConfigError;
use crate::instance::BasisAssignment;

/// Errors raised by cut selection, partitioning and reconstruction.
///
/// None of these are retried inside the engine. They propagate to the
/// caller, which decides whether to relax the budget, resubmit executions
/// or give up.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CutError {
    /// No cut set satisfies the wire budget and fragment-count range.
    #[error("No valid cut set: {reason}")]
    Infeasible {
        /// Why the search came up empty.
        reason: String,
    },

    /// A cut references a wire or operation index that does not exist.
    #[error("Invalid cut position {wire}@{index}: {reason}")]
    InvalidCutPosition {
        /// Wire of the offending cut.
        wire: WireId,
        /// Operation index of the offending cut.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The cuts did not disconnect the circuit.
    #[error("Cuts do not split the circuit: {components} operation-bearing component(s)")]
    NotASplit {
        /// Number of operation-bearing components after cutting.
        components: usize,
    },

    /// A fragment execution failed.
    #[error("Execution of fragment {fragment} under {assignment} failed: {source}")]
    Execution {
        /// Fragment that was executed.
        fragment: usize,
        /// Boundary assignment it was executed under.
        assignment: BasisAssignment,
        /// Error reported by the executor.
        #[source]
        source: ExecutionError,
    },

    /// A distribution needed by the reconstruction is missing.
    #[error("No distribution for fragment {fragment} under {assignment}")]
    ReconstructionMismatch {
        /// Fragment index.
        fragment: usize,
        /// Assignment that was looked up.
        assignment: BasisAssignment,
    },

    /// The cut set is too large to reconstruct.
    #[error("{cuts} cuts exceed the reconstruction limit of {max}")]
    TooManyCuts {
        /// Cuts in the partition.
        cuts: usize,
        /// Largest supported cut count.
        max: usize,
    },

    /// A distribution is malformed.
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Circuit graph error.
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Errors reported by a [`FragmentExecutor`](crate::executor::FragmentExecutor).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// The backend failed.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The fragment contains something the backend cannot run.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The fragment is wider than the backend allows.
    #[error("Fragment has {wires} wires, backend supports at most {max}")]
    TooLarge {
        /// Wires in the fragment.
        wires: usize,
        /// Backend limit.
        max: usize,
    },

    /// The execution timed out.
    #[error("Execution timed out: {0}")]
    Timeout(String),
}

/// Result type for cutting operations.
pub type CutResult<T> = Result<T, CutError>;
