//! Cut positions.

use std::fmt;

use qsplit_ir::{CircuitGraph, WireId};
use serde::{Deserialize, Serialize};

use crate::error::{CutError, CutResult};

/// A cut on one wire, between the operation at `index` and the operation at
/// `index + 1` in that wire's operation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CutPosition {
    /// The wire being cut.
    pub wire: WireId,
    /// Position of the last operation before the cut.
    pub index: usize,
}

impl CutPosition {
    /// Create a new cut position.
    pub const fn new(wire: WireId, index: usize) -> Self {
        Self { wire, index }
    }

    /// Check that this cut lies strictly between two operations of `graph`.
    pub fn validate(&self, graph: &CircuitGraph) -> CutResult<()> {
        let Some(ops) = graph.ops_on_wire(self.wire) else {
            return Err(self.invalid("wire is not part of the circuit"));
        };
        if self.index + 1 >= ops.len() {
            return Err(self.invalid(format!(
                "wire has {} operation(s), a cut needs an operation on both sides",
                ops.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> CutError {
        CutError::InvalidCutPosition {
            wire: self.wire,
            index: self.index,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CutPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.wire, self.index)
    }
}
