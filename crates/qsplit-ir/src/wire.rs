//! Wire identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The register a wire belongs to.
///
/// Wires of the circuit handed to the cutter live in the `Qubit` register.
/// Wires introduced while cutting live in the `Synthetic` register and never
/// appear in a caller-built circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegisterKind {
    /// A wire of the original circuit.
    Qubit,
    /// A wire created by cutting another wire.
    Synthetic,
}

/// Unique, ordered identifier for a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireId {
    /// Register the wire belongs to.
    pub kind: RegisterKind,
    /// Index within the register.
    pub index: u32,
}

impl WireId {
    /// A wire in the qubit register.
    #[inline]
    pub const fn qubit(index: u32) -> Self {
        Self {
            kind: RegisterKind::Qubit,
            index,
        }
    }

    /// A wire in the synthetic register.
    #[inline]
    pub const fn synthetic(index: u32) -> Self {
        Self {
            kind: RegisterKind::Synthetic,
            index,
        }
    }

    /// Whether this wire was created by cutting.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.kind == RegisterKind::Synthetic
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RegisterKind::Qubit => write!(f, "q{}", self.index),
            RegisterKind::Synthetic => write!(f, "s{}", self.index),
        }
    }
}

impl From<u32> for WireId {
    fn from(index: u32) -> Self {
        WireId::qubit(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_display() {
        assert_eq!(format!("{}", WireId::qubit(3)), "q3");
        assert_eq!(format!("{}", WireId::synthetic(0)), "s0");
    }

    #[test]
    fn test_wire_ordering() {
        let mut wires = vec![
            WireId::synthetic(0),
            WireId::qubit(2),
            WireId::qubit(0),
        ];
        wires.sort();
        assert_eq!(
            wires,
            vec![WireId::qubit(0), WireId::qubit(2), WireId::synthetic(0)]
        );
    }
}
