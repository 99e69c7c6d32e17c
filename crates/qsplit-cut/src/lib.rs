//! qsplit Cutting Engine
//!
//! Splits a circuit that is too wide for one device into narrower fragments,
//! runs every fragment under the preparations and measurements its cut wires
//! require, and recombines the fragment distributions into the distribution
//! of the uncut circuit.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────────────┐
//! │ CutSelector  │──→│  partition  │──→│ enumerate_all     │
//! │ (where?)     │   │ (fragments, │   │ (6^ρ · 3^O per    │
//! └──────────────┘   │  wire paths)│   │  fragment)        │
//!                    └─────────────┘   └─────────┬─────────┘
//!                                                │
//!                    ┌─────────────┐   ┌─────────▼─────────┐
//!                    │Reconstructor│◀──│ FragmentExecutor  │
//!                    │ (4^K terms, │   │ (any backend)     │
//!                    │  memoized)  │   └───────────────────┘
//!                    └─────────────┘
//! ```
//!
//! [`CircuitCutter`] drives all stages. Each stage is also usable on its
//! own, for example to run fragments on hardware outside this process and
//! feed the results back through [`FragmentResults`].
//!
//! # Example
//!
//! ```rust
//! use qsplit_cut::{CutPosition, enumerate_all, partition};
//! use qsplit_ir::{CircuitGraph, WireId};
//!
//! let mut graph = CircuitGraph::with_qubits("chain", 3);
//! graph.h(WireId::qubit(0)).unwrap();
//! graph.cx(WireId::qubit(0), WireId::qubit(1)).unwrap();
//! graph.cx(WireId::qubit(1), WireId::qubit(2)).unwrap();
//!
//! let cut = CutPosition::new(WireId::qubit(1), 0);
//! let partition = partition(&graph, &[cut]).unwrap();
//! assert_eq!(partition.num_fragments(), 2);
//! assert_eq!(partition.fragment_wire_counts(), vec![2, 2]);
//!
//! // 3 measurement settings upstream, 6 preparations downstream
//! assert_eq!(enumerate_all(&partition).len(), 9);
//! ```

pub mod config;
pub mod cut;
pub mod distribution;
pub mod error;
pub mod executor;
pub mod instance;
pub mod partition;
pub mod pipeline;
pub mod reconstruct;
pub mod selector;

pub use config::{ConfigError, CutConfig, ReconstructionMode, SelectionStrategy};
pub use cut::CutPosition;
pub use distribution::{
    FragmentDistribution, FragmentResults, ReconstructedDistribution, index_to_bitstring,
    parse_bitstring,
};
pub use error::{CutError, CutResult, ExecutionError};
pub use executor::FragmentExecutor;
pub use instance::{
    BasisAssignment, FragmentInstance, InitState, MeasBasis, Pauli, QubitRole, enumerate_all,
    enumerate_instances, qubit_roles,
};
pub use partition::{
    CutLink, Fragment, Partition, PathHop, WirePath, WirePathMap, fragment_of_ops, partition,
};
pub use pipeline::{CircuitCutter, CutDiagnostics, CutReport, ExecutionOutcome, InstanceFailure};
pub use reconstruct::{Reconstruction, ReconstructionStats, Reconstructor};
pub use selector::{CutSelector, CutSolution};
