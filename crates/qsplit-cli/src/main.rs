//! qsplit Command-Line Interface
//!
//! The main entry point for the qsplit CLI tool.
//!
//! ```text
//!   qsplit cut  -i circuit.json --max-wires 4      choose cuts, show fragments
//!   qsplit run  -i circuit.json --max-wires 4      cut, simulate, reconstruct
//!   qsplit run  --benchmark ghz --qubits 8 --compare
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::{CircuitArgs, SelectionArgs};
use commands::{cut, run, version};

/// qsplit - run circuits wider than your device by cutting them
#[derive(Parser)]
#[command(name = "qsplit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Choose cuts for a circuit and show the resulting fragments
    Cut {
        #[command(flatten)]
        circuit: CircuitArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Cut a circuit, run the fragments on the simulator and reconstruct
    Run {
        #[command(flatten)]
        circuit: CircuitArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Shots per fragment instance (exact probabilities if omitted)
        #[arg(short, long)]
        shots: Option<u64>,

        /// RNG seed for sampled execution
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Reconstruction mode (direct, likely)
        #[arg(short, long)]
        mode: Option<String>,

        /// Reconstruct on all cores
        #[arg(long)]
        parallel: bool,

        /// Disable reconstruction caches
        #[arg(long)]
        no_memo: bool,

        /// Compare against a simulation of the uncut circuit
        #[arg(long)]
        compare: bool,

        /// Number of outcomes to print
        #[arg(long, default_value = "16")]
        top: usize,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Cut {
            circuit,
            selection,
            format,
        } => cut::execute(&circuit, &selection, &format),

        Commands::Run {
            circuit,
            selection,
            shots,
            seed,
            mode,
            parallel,
            no_memo,
            compare,
            top,
            format,
        } => {
            run::execute(
                &circuit,
                &selection,
                &run::RunOptions {
                    shots,
                    seed,
                    mode: mode.as_deref(),
                    parallel,
                    memoize: !no_memo,
                    compare,
                    top,
                    format: &format,
                },
            )
            .await
        }

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
