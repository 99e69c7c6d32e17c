//! Run command implementation.

use std::collections::BTreeMap;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use qsplit_adapter_sim::{SimExecutor, simulate_probabilities};
use qsplit_cut::{CircuitCutter, CutDiagnostics, FragmentExecutor, ReconstructionMode};

use super::common::{
    CircuitArgs, SelectionArgs, build_config, print_distribution, resolve_circuit,
};

/// Run-specific options.
pub struct RunOptions<'a> {
    pub shots: Option<u64>,
    pub seed: u64,
    pub mode: Option<&'a str>,
    pub parallel: bool,
    pub memoize: bool,
    pub compare: bool,
    pub top: usize,
    pub format: &'a str,
}

#[derive(Serialize)]
struct Comparison {
    total_variation_distance: f64,
    hellinger_fidelity: f64,
    wasserstein_distance: f64,
}

#[derive(Serialize)]
struct RunReport<'a> {
    circuit: &'a str,
    executor: &'a str,
    diagnostics: &'a CutDiagnostics,
    distribution: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
}

/// Execute the run command.
pub async fn execute(
    circuit: &CircuitArgs,
    selection: &SelectionArgs,
    options: &RunOptions<'_>,
) -> Result<()> {
    let table = match options.format.to_lowercase().as_str() {
        "table" => true,
        "json" => false,
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    };

    let graph = resolve_circuit(circuit)?;
    let mut config = build_config(selection)?
        .with_parallel(options.parallel)
        .with_memoization(options.memoize);
    if let Some(mode) = options.mode {
        config = config.with_mode(mode.parse::<ReconstructionMode>()?);
    }

    let executor = match options.shots {
        Some(shots) => SimExecutor::with_shots(shots, options.seed),
        None => SimExecutor::exact(),
    };
    let cutter = CircuitCutter::new(executor, config)?;

    if table {
        println!(
            "{} Running {} ({} wires) on {} with at most {} wires per fragment",
            style("→").cyan().bold(),
            style(graph.name()).green(),
            graph.num_wires(),
            style(cutter.executor().name()).yellow(),
            cutter.config().max_wires_per_fragment
        );
    }

    let spinner = ProgressBar::new_spinner();
    if table {
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(template);
        }
        spinner.set_message("Cutting, executing and reconstructing...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    } else {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let report = cutter.run(&graph).await;
    spinner.finish_and_clear();
    let report = report?;

    let comparison = if options.compare {
        let reference = simulate_probabilities(&graph)?;
        Some(Comparison {
            total_variation_distance: report.distribution.total_variation_distance(&reference)?,
            hellinger_fidelity: report.distribution.hellinger_fidelity(&reference)?,
            wasserstein_distance: report.distribution.wasserstein_distance(&reference)?,
        })
    } else {
        None
    };

    if !table {
        let output = RunReport {
            circuit: graph.name(),
            executor: cutter.executor().name(),
            diagnostics: &report.diagnostics,
            distribution: report.distribution.to_bitstring_map(1e-12),
            comparison,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let diagnostics = &report.diagnostics;
    println!(
        "  {} cut(s), fragment widths {:?}, {} instances executed",
        diagnostics.num_cuts, diagnostics.fragment_wires, diagnostics.instances_executed
    );
    println!(
        "  {} of {} combinations evaluated ({} skipped), {} Kronecker products, {} prefix hits",
        diagnostics.stats.combinations_evaluated,
        diagnostics.stats.theoretical_combinations,
        diagnostics.stats.combinations_skipped,
        diagnostics.stats.kron_calls,
        diagnostics.stats.prefix_hits
    );

    print_distribution(&report.distribution, options.top);

    if let Some(comparison) = comparison {
        println!("\n  Against the uncut circuit:");
        println!(
            "    Total variation distance: {}",
            style(format!("{:.3e}", comparison.total_variation_distance)).yellow()
        );
        println!(
            "    Hellinger fidelity:       {}",
            style(format!("{:.9}", comparison.hellinger_fidelity)).yellow()
        );
        println!(
            "    Wasserstein distance:     {}",
            style(format!("{:.3e}", comparison.wasserstein_distance)).yellow()
        );
    }

    Ok(())
}
