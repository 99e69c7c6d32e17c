//! Fragment executor backed by the statevector engine.

use std::hash::{Hash, Hasher};
use std::time::Instant;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::{debug, instrument};

use qsplit_cut::{
    BasisAssignment, ExecutionError, Fragment, FragmentDistribution, FragmentExecutor,
    index_to_bitstring,
};
use qsplit_ir::CircuitGraph;

use crate::error::{SimError, SimResult};
use crate::statevector::{Statevector, sample_index};

/// Default wire limit.
const DEFAULT_MAX_WIRES: usize = 20;

/// How the executor turns a final state into a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    /// Exact probabilities.
    Exact,
    /// Sampled counts.
    Shots {
        /// Shots per instance.
        shots: u64,
        /// Base RNG seed.
        seed: u64,
    },
}

/// Local statevector executor.
///
/// This executor supports fragments up to ~20 wires (limited by memory).
#[derive(Debug, Clone)]
pub struct SimExecutor {
    mode: SimMode,
    max_wires: usize,
}

impl SimExecutor {
    /// Executor returning exact probabilities.
    pub fn exact() -> Self {
        Self {
            mode: SimMode::Exact,
            max_wires: DEFAULT_MAX_WIRES,
        }
    }

    /// Executor sampling `shots` per instance.
    pub fn with_shots(shots: u64, seed: u64) -> Self {
        Self {
            mode: SimMode::Shots { shots, seed },
            max_wires: DEFAULT_MAX_WIRES,
        }
    }

    /// Set the wire limit.
    pub fn with_max_wires(mut self, max_wires: usize) -> Self {
        self.max_wires = max_wires;
        self
    }

    /// The sampling mode.
    pub fn mode(&self) -> SimMode {
        self.mode
    }

    /// Run one instance synchronously.
    #[instrument(skip_all, fields(fragment = fragment.index, assignment = %assignment))]
    fn run_instance(
        &self,
        fragment: &Fragment,
        assignment: &BasisAssignment,
    ) -> Result<FragmentDistribution, ExecutionError> {
        let start = Instant::now();
        let num_wires = fragment.num_wires();
        check_width(num_wires, self.max_wires)?;

        let mut sv = Statevector::new(num_wires);
        for (local, state) in &assignment.inits {
            sv.prepare(*local as usize, *state);
        }
        run_gates(&mut sv, &fragment.graph)?;
        for (local, basis) in &assignment.meas {
            sv.rotate_to_basis(*local as usize, *basis);
        }
        let probs = sv.probabilities();

        let distribution = match self.mode {
            SimMode::Exact => FragmentDistribution::from_probabilities(num_wires, probs),
            SimMode::Shots { shots, seed } => {
                let mut rng = StdRng::seed_from_u64(instance_seed(seed, fragment, assignment));
                let mut counts: FxHashMap<usize, u64> = FxHashMap::default();
                for _ in 0..shots {
                    *counts.entry(sample_index(&probs, &mut rng)).or_insert(0) += 1;
                }
                FragmentDistribution::from_counts(
                    num_wires,
                    counts
                        .into_iter()
                        .map(|(index, count)| (index_to_bitstring(index, num_wires), count)),
                )
            }
        }
        .map_err(|e| ExecutionError::Backend(e.to_string()))?;

        debug!("Instance simulated in {:?}", start.elapsed());
        Ok(distribution)
    }
}

impl Default for SimExecutor {
    fn default() -> Self {
        Self::exact()
    }
}

#[async_trait]
impl FragmentExecutor for SimExecutor {
    fn name(&self) -> &str {
        match self.mode {
            SimMode::Exact => "statevector",
            SimMode::Shots { .. } => "statevector-shots",
        }
    }

    async fn execute(
        &self,
        fragment: &Fragment,
        assignment: &BasisAssignment,
    ) -> Result<FragmentDistribution, ExecutionError> {
        self.run_instance(fragment, assignment)
    }
}

/// Exact output distribution of an uncut circuit, indexed little-endian
/// over the graph's wire order.
pub fn simulate_probabilities(graph: &CircuitGraph) -> SimResult<Vec<f64>> {
    check_width(graph.num_wires(), DEFAULT_MAX_WIRES)?;
    let mut sv = Statevector::new(graph.num_wires());
    run_gates(&mut sv, graph)?;
    Ok(sv.probabilities())
}

fn check_width(wires: usize, max: usize) -> SimResult<()> {
    if wires > max {
        return Err(SimError::TooLarge { wires, max });
    }
    Ok(())
}

fn run_gates(sv: &mut Statevector, graph: &CircuitGraph) -> SimResult<()> {
    let mut qubits = Vec::with_capacity(3);
    for op in graph.ops() {
        qubits.clear();
        for wire in &op.wires {
            let position = graph
                .wire_position(*wire)
                .ok_or_else(|| SimError::UnknownWire {
                    gate: op.gate.name().to_string(),
                    wire: wire.to_string(),
                })?;
            qubits.push(position);
        }
        sv.apply(&op.gate, &qubits)?;
    }
    Ok(())
}

/// Seed for one instance, independent of dispatch order.
fn instance_seed(seed: u64, fragment: &Fragment, assignment: &BasisAssignment) -> u64 {
    let mut hasher = FxHasher::default();
    seed.hash(&mut hasher);
    fragment.index.hash(&mut hasher);
    assignment.hash(&mut hasher);
    hasher.finish()
}
