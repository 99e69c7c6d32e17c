//! qsplit Circuit Graph
//!
//! This crate provides the data model that the qsplit cutting engine works
//! on: an ordered table of wires and an arena of operation nodes addressed by
//! stable integer ids. Every wire carries a totally ordered list of the
//! operations that touch it, and the arena's insertion order is a
//! topological order of the circuit.
//!
//! The cutting engine treats operations as opaque, wire-addressed units.
//! Only execution backends look inside a [`Gate`].
//!
//! # Example: a 3-qubit GHZ chain
//!
//! ```rust
//! use qsplit_ir::{CircuitGraph, WireId};
//!
//! let mut graph = CircuitGraph::with_qubits("ghz", 3);
//! graph.h(WireId::qubit(0)).unwrap();
//! graph.cx(WireId::qubit(0), WireId::qubit(1)).unwrap();
//! graph.cx(WireId::qubit(1), WireId::qubit(2)).unwrap();
//!
//! assert_eq!(graph.num_wires(), 3);
//! assert_eq!(graph.num_ops(), 3);
//! assert_eq!(graph.ops_on_wire(WireId::qubit(1)).unwrap().len(), 2);
//! assert_eq!(graph.depth(), 3);
//! ```
//!
//! # Circuit files
//!
//! Circuits can be exchanged as JSON:
//!
//! ```json
//! {
//!   "name": "bell",
//!   "num_qubits": 2,
//!   "ops": [
//!     { "gate": "H", "wires": [0] },
//!     { "gate": "CX", "wires": [0, 1] }
//!   ]
//! }
//! ```

pub mod error;
pub mod gate;
pub mod graph;
pub mod wire;

pub use error::{IrError, IrResult};
pub use gate::{Gate, OperationNode};
pub use graph::{CircuitGraph, DagNode, OpId};
pub use wire::{RegisterKind, WireId};
