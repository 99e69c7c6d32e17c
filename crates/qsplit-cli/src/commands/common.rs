//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use qsplit_cut::{CutConfig, Partition, ReconstructedDistribution, SelectionStrategy};
use qsplit_ir::CircuitGraph;

/// Where the circuit comes from.
#[derive(Args, Debug)]
pub struct CircuitArgs {
    /// Input circuit file (JSON)
    #[arg(short, long, required_unless_present = "benchmark")]
    pub input: Option<String>,

    /// Built-in benchmark circuit instead of a file (ghz, ansatz)
    #[arg(long, conflicts_with = "input")]
    pub benchmark: Option<String>,

    /// Number of qubits for the benchmark circuit
    #[arg(long, default_value = "6")]
    pub qubits: u32,

    /// Number of layers for the ansatz benchmark
    #[arg(long, default_value = "1")]
    pub layers: u32,
}

/// Cut-selection settings; flags override the configuration file.
#[derive(Args, Debug)]
pub struct SelectionArgs {
    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Maximum wires per fragment
    #[arg(short = 'w', long)]
    pub max_wires: Option<usize>,

    /// Minimum number of fragments
    #[arg(long)]
    pub min_fragments: Option<usize>,

    /// Maximum number of fragments
    #[arg(long)]
    pub max_fragments: Option<usize>,

    /// Selection strategy (auto, exact, greedy)
    #[arg(long)]
    pub strategy: Option<String>,

    /// Weight of one cut against one wire of fragment width
    #[arg(long)]
    pub cut_cost_weight: Option<f64>,
}

/// Load a circuit from a JSON file.
pub fn load_circuit(path: &str) -> Result<CircuitGraph> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        anyhow::bail!("File not found: {path}");
    }

    let ext = path_obj.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !ext.eq_ignore_ascii_case("json") {
        anyhow::bail!("Unsupported circuit format '{ext}': expected a .json file");
    }

    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    CircuitGraph::from_json(&source).with_context(|| format!("Invalid circuit file: {path}"))
}

/// Build a named benchmark circuit.
pub fn benchmark_circuit(name: &str, qubits: u32, layers: u32) -> Result<CircuitGraph> {
    let graph = match name.to_lowercase().as_str() {
        "ghz" => CircuitGraph::ghz(qubits)?,
        "ansatz" | "hwea" => CircuitGraph::layered_ansatz(qubits, layers)?,
        other => anyhow::bail!("Unknown benchmark: '{other}'. Available: ghz, ansatz"),
    };
    Ok(graph)
}

/// Resolve the circuit named by the command-line arguments.
pub fn resolve_circuit(args: &CircuitArgs) -> Result<CircuitGraph> {
    match (&args.input, &args.benchmark) {
        (Some(path), _) => load_circuit(path),
        (None, Some(name)) => benchmark_circuit(name, args.qubits, args.layers),
        (None, None) => anyhow::bail!("Either --input or --benchmark is required"),
    }
}

/// Load the configuration and apply command-line overrides.
pub fn build_config(args: &SelectionArgs) -> Result<CutConfig> {
    let mut config = CutConfig::load(args.config.as_deref().map(Path::new))?;

    if let Some(max_wires) = args.max_wires {
        config.max_wires_per_fragment = max_wires;
    }
    if let Some(min) = args.min_fragments {
        config.min_fragments = min;
    }
    if let Some(max) = args.max_fragments {
        config.max_fragments = max;
    }
    if let Some(strategy) = &args.strategy {
        config.strategy = strategy.parse::<SelectionStrategy>()?;
    }
    if let Some(weight) = args.cut_cost_weight {
        config.cut_cost_weight = Some(weight);
    }

    config.validate()?;
    Ok(config)
}

/// Print the fragments of a partition and the path of every wire.
pub fn print_partition(partition: &Partition) {
    println!("\n{} Fragments:", style("✓").green().bold());
    for fragment in &partition.fragments {
        let sources: Vec<String> = fragment.sources.iter().map(ToString::to_string).collect();
        println!(
            "  {} {:>2} wires, {:>3} ops, depth {:>3}  [{}]",
            style(format!("f{}", fragment.index)).cyan(),
            fragment.num_wires(),
            fragment.num_ops(),
            fragment.graph.depth(),
            sources.join(" ")
        );
    }

    println!("\n  Wire paths:");
    for path in partition.paths.paths() {
        let hops: Vec<String> = path
            .hops
            .iter()
            .map(|hop| format!("f{}:{}", hop.fragment, hop.local))
            .collect();
        println!("    {}: {}", style(path.wire).yellow(), hops.join(" → "));
    }
}

/// Print the most likely outcomes of a reconstructed distribution.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn print_distribution(distribution: &ReconstructedDistribution, top: usize) {
    println!(
        "\n{} Reconstructed distribution ({} wires):",
        style("✓").green().bold(),
        distribution.num_wires()
    );

    for (bitstring, p) in distribution.top_k(top) {
        let bar_len = (p.max(0.0) * 50.0).round() as usize;
        let bar: String = "█".repeat(bar_len);
        println!(
            "  {}: {:>9.6} {}",
            style(bitstring).cyan(),
            p,
            style(bar).green()
        );
    }

    let outcomes = 1usize << distribution.num_wires();
    if outcomes > top {
        println!("  ... and {} more outcomes", outcomes - top);
    }
}
