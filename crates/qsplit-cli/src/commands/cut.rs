//! Cut command implementation.

use anyhow::Result;
use console::style;
use serde::Serialize;

use qsplit_cut::{
    CutSelector, CutSolution, Fragment, WirePath, enumerate_all, fragment_of_ops, partition,
};
use qsplit_ir::{OpId, WireId};

use super::common::{CircuitArgs, SelectionArgs, build_config, print_partition, resolve_circuit};

#[derive(Serialize)]
struct FragmentSummary {
    index: usize,
    wires: usize,
    ops: usize,
    depth: usize,
    sources: Vec<WireId>,
    /// Circuit operations that landed in this fragment.
    operations: Vec<OpId>,
}

impl FragmentSummary {
    fn new(fragment: &Fragment, operations: Vec<OpId>) -> Self {
        Self {
            index: fragment.index,
            wires: fragment.num_wires(),
            ops: fragment.num_ops(),
            depth: fragment.graph.depth(),
            sources: fragment.sources.clone(),
            operations,
        }
    }
}

#[derive(Serialize)]
struct CutPlan<'a> {
    circuit: &'a str,
    solution: &'a CutSolution,
    instances: usize,
    idle_wires: Vec<WireId>,
    fragments: Vec<FragmentSummary>,
    paths: &'a [WirePath],
}

/// Execute the cut command.
pub fn execute(circuit: &CircuitArgs, selection: &SelectionArgs, format: &str) -> Result<()> {
    let graph = resolve_circuit(circuit)?;
    let config = build_config(selection)?;

    let solution = CutSelector::from_config(&config).select(&graph)?;
    let partition = partition(&graph, &solution.cuts)?;
    let instances = enumerate_all(&partition).len();
    let idle_wires: Vec<WireId> = graph.idle_wires().collect();

    match format.to_lowercase().as_str() {
        "json" => {
            let plan = CutPlan {
                circuit: graph.name(),
                solution: &solution,
                instances,
                idle_wires,
                fragments: partition
                    .fragments
                    .iter()
                    .zip(fragment_of_ops(&graph, &partition))
                    .map(|(fragment, operations)| FragmentSummary::new(fragment, operations))
                    .collect(),
                paths: partition.paths.paths(),
            };
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        "table" => {
            println!(
                "{} Cutting {} ({} wires, {} ops) with at most {} wires per fragment",
                style("→").cyan().bold(),
                style(graph.name()).green(),
                graph.num_wires(),
                graph.num_ops(),
                style(config.max_wires_per_fragment).yellow()
            );
            if solution.cuts.is_empty() {
                println!("  No cuts needed");
            } else {
                let cuts: Vec<String> = solution.cuts.iter().map(ToString::to_string).collect();
                println!(
                    "  {} cut(s) via {}: {}",
                    solution.cuts.len(),
                    solution.strategy,
                    cuts.join(", ")
                );
            }
            println!(
                "  {} fragment(s), widest {} wires, {} instances to execute",
                solution.num_fragments, solution.max_fragment_wires, instances
            );
            if !idle_wires.is_empty() {
                let idle: Vec<String> = idle_wires.iter().map(ToString::to_string).collect();
                println!("  Idle wires: {}", idle.join(", "));
            }
            print_partition(&partition);
        }
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }

    Ok(())
}
