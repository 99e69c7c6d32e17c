//! End-to-end cutting pipeline.
//!
//! ```text
//!   select ──→ partition ──→ enumerate ──→ execute (concurrent) ──→ reconstruct
//! ```
//!
//! Selection and partitioning failures abort the run before anything is
//! dispatched to the executor. Execution is a barrier: reconstruction only
//! starts once every instance has either succeeded or failed.

use futures::stream::{self, StreamExt};
use qsplit_ir::CircuitGraph;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{CutConfig, ReconstructionMode};
use crate::cut::CutPosition;
use crate::distribution::{FragmentResults, ReconstructedDistribution};
use crate::error::{CutError, CutResult, ExecutionError};
use crate::executor::FragmentExecutor;
use crate::instance::{FragmentInstance, enumerate_all};
use crate::partition::{Partition, partition};
use crate::reconstruct::{Reconstruction, ReconstructionStats, Reconstructor};
use crate::selector::{CutSelector, CutSolution};

/// An instance the executor could not run.
#[derive(Debug, Clone)]
pub struct InstanceFailure {
    /// The instance.
    pub instance: FragmentInstance,
    /// The executor's error.
    pub error: ExecutionError,
}

/// Result of dispatching a batch of instances.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Distributions of the instances that succeeded.
    pub results: FragmentResults,
    /// Instances that failed, in enumeration order.
    pub failures: Vec<InstanceFailure>,
}

impl ExecutionOutcome {
    /// Whether every instance succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Metadata reported alongside the reconstructed distribution.
#[derive(Debug, Clone, Serialize)]
pub struct CutDiagnostics {
    /// Applied cuts.
    pub cuts: Vec<CutPosition>,
    /// Local wire count per fragment.
    pub fragment_wires: Vec<usize>,
    /// Number of cuts.
    pub num_cuts: usize,
    /// Number of fragment instances executed.
    pub instances_executed: usize,
    /// Reconstruction counters, including evaluated versus theoretical
    /// combinations.
    pub stats: ReconstructionStats,
}

/// Output of a pipeline run.
#[derive(Debug, Clone)]
pub struct CutReport {
    /// The reconstructed distribution.
    pub distribution: ReconstructedDistribution,
    /// What was done to get it.
    pub diagnostics: CutDiagnostics,
}

/// Cuts, executes and reconstructs circuits with a given executor.
pub struct CircuitCutter<E> {
    executor: E,
    config: CutConfig,
}

impl<E: FragmentExecutor> CircuitCutter<E> {
    /// Create a cutter. The configuration is validated.
    pub fn new(executor: E, config: CutConfig) -> CutResult<Self> {
        config.validate()?;
        Ok(Self { executor, config })
    }

    /// The configuration.
    pub fn config(&self) -> &CutConfig {
        &self.config
    }

    /// The executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Choose cuts for `graph`.
    pub fn select_cuts(&self, graph: &CircuitGraph) -> CutResult<CutSolution> {
        CutSelector::from_config(&self.config).select(graph)
    }

    /// Apply `cuts` to `graph`.
    pub fn partition(&self, graph: &CircuitGraph, cuts: &[CutPosition]) -> CutResult<Partition> {
        partition(graph, cuts)
    }

    /// Enumerate the instances every fragment has to be run under.
    #[instrument(skip_all, fields(fragments = partition.num_fragments()))]
    pub fn enumerate_instances(&self, partition: &Partition) -> Vec<FragmentInstance> {
        let instances = enumerate_all(partition);
        info!("Enumerated {} fragment instances", instances.len());
        instances
    }

    /// Run `instances` on the executor, at most
    /// `max_concurrent_executions` at a time, and wait for all of them.
    #[instrument(skip_all, fields(executor = self.executor.name(), instances = instances.len()))]
    pub async fn execute_instances(
        &self,
        partition: &Partition,
        instances: &[FragmentInstance],
    ) -> ExecutionOutcome {
        let executor = &self.executor;
        let mut completed: Vec<_> = stream::iter(instances.iter().enumerate())
            .map(|(order, instance)| async move {
                let outcome = match partition.fragments.get(instance.fragment) {
                    Some(fragment) => executor.execute(fragment, &instance.assignment).await,
                    None => Err(ExecutionError::Backend(format!(
                        "fragment {} does not exist",
                        instance.fragment
                    ))),
                };
                (order, outcome)
            })
            .buffer_unordered(self.config.max_concurrent_executions)
            .collect()
            .await;
        completed.sort_by_key(|(order, _)| *order);

        let mut results = FragmentResults::new(partition.num_fragments());
        let mut failures = Vec::new();
        for (order, outcome) in completed {
            let instance = &instances[order];
            match outcome {
                Ok(distribution) => {
                    if let Err(e) = results.insert(
                        instance.fragment,
                        instance.assignment.clone(),
                        distribution,
                    ) {
                        failures.push(InstanceFailure {
                            instance: instance.clone(),
                            error: ExecutionError::Backend(e.to_string()),
                        });
                    }
                }
                Err(error) => {
                    warn!(
                        "Fragment {} under {} failed: {error}",
                        instance.fragment, instance.assignment
                    );
                    failures.push(InstanceFailure {
                        instance: instance.clone(),
                        error,
                    });
                }
            }
        }

        debug!(
            "Executed {} instances, {} failed",
            instances.len(),
            failures.len()
        );
        ExecutionOutcome { results, failures }
    }

    /// Reconstruct the full distribution from fragment results.
    pub fn reconstruct(
        &self,
        partition: &Partition,
        results: &FragmentResults,
    ) -> CutResult<Reconstruction> {
        Reconstructor::new(partition)?
            .with_memoization(self.config.memoize)
            .with_parallel(self.config.parallel)
            .with_normalization_tolerance(self.config.normalization_tolerance)
            .reconstruct(results)
    }

    /// Run the whole pipeline, choosing cuts automatically.
    #[instrument(skip_all, fields(circuit = graph.name()))]
    pub async fn run(&self, graph: &CircuitGraph) -> CutResult<CutReport> {
        let solution = self.select_cuts(graph)?;
        self.run_with_cuts(graph, &solution.cuts).await
    }

    /// Run the pipeline with caller-provided cuts.
    #[instrument(skip_all, fields(circuit = graph.name(), cuts = cuts.len()))]
    pub async fn run_with_cuts(
        &self,
        graph: &CircuitGraph,
        cuts: &[CutPosition],
    ) -> CutResult<CutReport> {
        let partition = self.partition(graph, cuts)?;
        let instances = self.enumerate_instances(&partition);

        let outcome = self.execute_instances(&partition, &instances).await;
        if let Some(failure) = outcome.failures.into_iter().next() {
            return Err(CutError::Execution {
                fragment: failure.instance.fragment,
                assignment: failure.instance.assignment,
                source: failure.error,
            });
        }

        let reconstruction = self.reconstruct(&partition, &outcome.results)?;
        let distribution = match self.config.mode {
            ReconstructionMode::Direct => reconstruction.distribution,
            ReconstructionMode::Likely => reconstruction.distribution.nearest_probability(),
        };

        Ok(CutReport {
            distribution,
            diagnostics: CutDiagnostics {
                cuts: partition.cuts.clone(),
                fragment_wires: partition.fragment_wire_counts(),
                num_cuts: partition.cuts.len(),
                instances_executed: instances.len(),
                stats: reconstruction.stats,
            },
        })
    }
}
