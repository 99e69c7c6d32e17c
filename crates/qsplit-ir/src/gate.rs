//! Gates and operation nodes.

use serde::{Deserialize, Serialize};

use crate::wire::WireId;

/// Gates an operation node can carry.
///
/// The cutting engine never looks inside a gate: it only needs the wires an
/// operation touches. Executors interpret the gate when running a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gate {
    // Single-qubit Pauli gates
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,

    // Single-qubit Clifford gates
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,
    /// sqrt(X) gate.
    SX,
    /// sqrt(X)-dagger gate.
    SXdg,

    // Single-qubit rotation gates
    /// Rotation around X axis.
    Rx(f64),
    /// Rotation around Y axis.
    Ry(f64),
    /// Rotation around Z axis.
    Rz(f64),
    /// Phase gate.
    P(f64),
    /// Universal single-qubit gate U(θ, φ, λ).
    U(f64, f64, f64),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// Controlled-Hadamard gate.
    CH,
    /// SWAP gate.
    Swap,
    /// iSWAP gate.
    ISwap,
    /// Controlled rotation around Z.
    CRz(f64),
    /// Controlled phase gate.
    CP(f64),
    /// ZZ rotation gate.
    RZZ(f64),

    // Three-qubit gates
    /// Toffoli gate (CCX).
    CCX,
    /// Fredkin gate (CSWAP).
    CSwap,

    /// An operation with no semantics known to this crate.
    Opaque {
        /// Operation name.
        name: String,
        /// Number of wires the operation acts on.
        num_wires: u32,
    },
}

impl Gate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Gate::I => "id",
            Gate::X => "x",
            Gate::Y => "y",
            Gate::Z => "z",
            Gate::H => "h",
            Gate::S => "s",
            Gate::Sdg => "sdg",
            Gate::T => "t",
            Gate::Tdg => "tdg",
            Gate::SX => "sx",
            Gate::SXdg => "sxdg",
            Gate::Rx(_) => "rx",
            Gate::Ry(_) => "ry",
            Gate::Rz(_) => "rz",
            Gate::P(_) => "p",
            Gate::U(_, _, _) => "u",
            Gate::CX => "cx",
            Gate::CY => "cy",
            Gate::CZ => "cz",
            Gate::CH => "ch",
            Gate::Swap => "swap",
            Gate::ISwap => "iswap",
            Gate::CRz(_) => "crz",
            Gate::CP(_) => "cp",
            Gate::RZZ(_) => "rzz",
            Gate::CCX => "ccx",
            Gate::CSwap => "cswap",
            Gate::Opaque { name, .. } => name,
        }
    }

    /// Get the number of wires this gate acts on.
    pub fn num_wires(&self) -> u32 {
        match self {
            Gate::I
            | Gate::X
            | Gate::Y
            | Gate::Z
            | Gate::H
            | Gate::S
            | Gate::Sdg
            | Gate::T
            | Gate::Tdg
            | Gate::SX
            | Gate::SXdg
            | Gate::Rx(_)
            | Gate::Ry(_)
            | Gate::Rz(_)
            | Gate::P(_)
            | Gate::U(_, _, _) => 1,

            Gate::CX
            | Gate::CY
            | Gate::CZ
            | Gate::CH
            | Gate::Swap
            | Gate::ISwap
            | Gate::CRz(_)
            | Gate::CP(_)
            | Gate::RZZ(_) => 2,

            Gate::CCX | Gate::CSwap => 3,

            Gate::Opaque { num_wires, .. } => *num_wires,
        }
    }

    /// Check if this gate is opaque.
    #[inline]
    pub fn is_opaque(&self) -> bool {
        matches!(self, Gate::Opaque { .. })
    }
}

/// An operation in the circuit arena: a gate and the ordered wires it touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationNode {
    /// The gate applied.
    pub gate: Gate,
    /// Wires the gate acts on, in gate-argument order.
    pub wires: Vec<WireId>,
}

impl OperationNode {
    /// Create an operation node.
    pub fn new(gate: Gate, wires: impl IntoIterator<Item = WireId>) -> Self {
        Self {
            gate,
            wires: wires.into_iter().collect(),
        }
    }

    /// Check whether this operation touches `wire`.
    #[inline]
    pub fn touches(&self, wire: WireId) -> bool {
        self.wires.contains(&wire)
    }
}
