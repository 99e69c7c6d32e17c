//! qsplit Statevector Executor
//!
//! A [`FragmentExecutor`](qsplit_cut::FragmentExecutor) that runs fragments
//! on a local statevector. It prepares the requested initialization on every
//! Rho wire, applies the fragment's gates, rotates every O wire into its
//! measurement basis and reads out all local wires.
//!
//! Two modes are available:
//!
//! - **Exact**: the executor returns the probabilities of the final state.
//! - **Shots**: the executor samples a fixed number of shots from a seeded
//!   RNG. The seed is mixed with the fragment index and the assignment, so
//!   results do not depend on the order instances are dispatched in.
//!
//! [`simulate_probabilities`] runs an uncut circuit the same way and serves
//! as the reference when checking a reconstruction.
//!
//! # Memory
//!
//! | Wires | Memory |
//! |-------|--------|
//! | 10 | ~16 KB |
//! | 20 | ~16 MB |
//! | 25 | ~512 MB |
//!
//! # Example
//!
//! ```ignore
//! use qsplit_adapter_sim::SimExecutor;
//! use qsplit_cut::{CircuitCutter, CutConfig};
//! use qsplit_ir::CircuitGraph;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let graph = CircuitGraph::ghz(6)?;
//!     let cutter = CircuitCutter::new(SimExecutor::exact(), CutConfig::new(4))?;
//!     let report = cutter.run(&graph).await?;
//!     println!("{:?}", report.distribution.top_k(2));
//!     Ok(())
//! }
//! ```

mod error;
mod executor;
mod statevector;

pub use error::{SimError, SimResult};
pub use executor::{SimExecutor, SimMode, simulate_probabilities};
pub use statevector::Statevector;
