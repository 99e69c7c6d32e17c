//! CLI command parsing and end-to-end tests.
//!
//! Argument parsing is tested on an equivalent clap definition (the CLI is a
//! binary crate), and the built `qsplit` binary is run on small circuits.

// ============================================================================
// Circuit and configuration loading
// ============================================================================

mod loading {
    use qsplit_cut::{CutConfig, SelectionStrategy};
    use qsplit_ir::CircuitGraph;
    use std::fs;

    const CHAIN: &str = r#"{
        "name": "chain",
        "num_qubits": 3,
        "ops": [
            { "gate": "H", "wires": [0] },
            { "gate": "CX", "wires": [0, 1] },
            { "gate": { "Ry": 0.5 }, "wires": [1] },
            { "gate": "CX", "wires": [1, 2] }
        ]
    }"#;

    #[test]
    fn test_load_circuit_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, CHAIN).unwrap();

        let source = fs::read_to_string(&path).unwrap();
        let graph = CircuitGraph::from_json(&source).unwrap();
        assert_eq!(graph.name(), "chain");
        assert_eq!(graph.num_wires(), 3);
        assert_eq!(graph.num_ops(), 4);
    }

    #[test]
    fn test_circuit_with_bad_wire_rejected() {
        let source = r#"{ "num_qubits": 2, "ops": [{ "gate": "CX", "wires": [0, 2] }] }"#;
        assert!(CircuitGraph::from_json(source).is_err());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qsplit.yaml");
        fs::write(
            &path,
            "max_wires_per_fragment: 5\nstrategy: greedy\nmax_fragments: 3\n",
        )
        .unwrap();

        let config = CutConfig::from_file(&path).unwrap();
        assert_eq!(config.max_wires_per_fragment, 5);
        assert_eq!(config.max_fragments, 3);
        assert_eq!(config.strategy, SelectionStrategy::Greedy);
        assert!(config.memoize);
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "min_fragments: 4\nmax_fragments: 2\n").unwrap();
        assert!(CutConfig::from_file(&path).is_err());
    }
}

// ============================================================================
// Clap argument parsing (test via try_parse_from on equivalent structs)
// ============================================================================

mod clap_parsing {
    use clap::{Args, Parser, Subcommand};

    #[derive(Parser)]
    #[command(name = "qsplit")]
    struct TestCli {
        #[arg(short, long, action = clap::ArgAction::Count, global = true)]
        verbose: u8,

        #[command(subcommand)]
        command: TestCommands,
    }

    #[derive(Args, Debug)]
    struct CircuitArgs {
        #[arg(short, long, required_unless_present = "benchmark")]
        input: Option<String>,
        #[arg(long, conflicts_with = "input")]
        benchmark: Option<String>,
        #[arg(long, default_value = "6")]
        qubits: u32,
        #[arg(long, default_value = "1")]
        layers: u32,
    }

    #[derive(Args, Debug)]
    struct SelectionArgs {
        #[arg(short, long)]
        config: Option<String>,
        #[arg(short = 'w', long)]
        max_wires: Option<usize>,
        #[arg(long)]
        min_fragments: Option<usize>,
        #[arg(long)]
        max_fragments: Option<usize>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        cut_cost_weight: Option<f64>,
    }

    #[derive(Subcommand)]
    enum TestCommands {
        Cut {
            #[command(flatten)]
            circuit: CircuitArgs,
            #[command(flatten)]
            selection: SelectionArgs,
            #[arg(short, long, default_value = "table")]
            format: String,
        },
        Run {
            #[command(flatten)]
            circuit: CircuitArgs,
            #[command(flatten)]
            selection: SelectionArgs,
            #[arg(short, long)]
            shots: Option<u64>,
            #[arg(long, default_value = "0")]
            seed: u64,
            #[arg(short, long)]
            mode: Option<String>,
            #[arg(long)]
            parallel: bool,
            #[arg(long)]
            no_memo: bool,
            #[arg(long)]
            compare: bool,
            #[arg(long, default_value = "16")]
            top: usize,
            #[arg(short, long, default_value = "table")]
            format: String,
        },
        Version,
    }

    #[test]
    fn test_parse_cut_minimal() {
        let cli = TestCli::try_parse_from(["qsplit", "cut", "-i", "c.json"]).unwrap();
        match cli.command {
            TestCommands::Cut {
                circuit,
                selection,
                format,
            } => {
                assert_eq!(circuit.input.as_deref(), Some("c.json"));
                assert!(circuit.benchmark.is_none());
                assert!(selection.max_wires.is_none());
                assert_eq!(format, "table");
            }
            _ => panic!("expected cut"),
        }
    }

    #[test]
    fn test_parse_cut_with_selection_flags() {
        let cli = TestCli::try_parse_from([
            "qsplit",
            "cut",
            "--benchmark",
            "ansatz",
            "--qubits",
            "8",
            "--layers",
            "2",
            "-w",
            "5",
            "--max-fragments",
            "3",
            "--strategy",
            "greedy",
            "--cut-cost-weight",
            "0.5",
            "-f",
            "json",
        ])
        .unwrap();
        match cli.command {
            TestCommands::Cut {
                circuit,
                selection,
                format,
            } => {
                assert_eq!(circuit.benchmark.as_deref(), Some("ansatz"));
                assert_eq!(circuit.qubits, 8);
                assert_eq!(circuit.layers, 2);
                assert_eq!(selection.max_wires, Some(5));
                assert_eq!(selection.max_fragments, Some(3));
                assert_eq!(selection.strategy.as_deref(), Some("greedy"));
                assert_eq!(selection.cut_cost_weight, Some(0.5));
                assert_eq!(format, "json");
            }
            _ => panic!("expected cut"),
        }
    }

    #[test]
    fn test_parse_cut_requires_circuit() {
        assert!(TestCli::try_parse_from(["qsplit", "cut", "-w", "4"]).is_err());
    }

    #[test]
    fn test_parse_input_conflicts_with_benchmark() {
        let result =
            TestCli::try_parse_from(["qsplit", "cut", "-i", "c.json", "--benchmark", "ghz"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = TestCli::try_parse_from(["qsplit", "run", "--benchmark", "ghz"]).unwrap();
        match cli.command {
            TestCommands::Run {
                shots,
                seed,
                mode,
                parallel,
                no_memo,
                compare,
                top,
                format,
                ..
            } => {
                assert!(shots.is_none());
                assert_eq!(seed, 0);
                assert!(mode.is_none());
                assert!(!parallel);
                assert!(!no_memo);
                assert!(!compare);
                assert_eq!(top, 16);
                assert_eq!(format, "table");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_run_sampled() {
        let cli = TestCli::try_parse_from([
            "qsplit", "run", "-i", "c.json", "-s", "2000", "--seed", "9", "-m", "likely",
            "--parallel", "--no-memo", "--compare",
        ])
        .unwrap();
        match cli.command {
            TestCommands::Run {
                shots,
                seed,
                mode,
                parallel,
                no_memo,
                compare,
                ..
            } => {
                assert_eq!(shots, Some(2000));
                assert_eq!(seed, 9);
                assert_eq!(mode.as_deref(), Some("likely"));
                assert!(parallel);
                assert!(no_memo);
                assert!(compare);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_version() {
        let cli = TestCli::try_parse_from(["qsplit", "version"]).unwrap();
        assert!(matches!(cli.command, TestCommands::Version));
    }

    #[test]
    fn test_parse_verbose_vv() {
        let cli = TestCli::try_parse_from(["qsplit", "-vv", "version"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_no_subcommand() {
        assert!(TestCli::try_parse_from(["qsplit"]).is_err());
    }
}

// ============================================================================
// Binary
// ============================================================================

mod binary {
    use std::fs;
    use std::process::Command;

    fn qsplit() -> Command {
        Command::new(env!("CARGO_BIN_EXE_qsplit"))
    }

    const CHAIN: &str = r#"{
        "name": "chain",
        "num_qubits": 3,
        "ops": [
            { "gate": "H", "wires": [0] },
            { "gate": "CX", "wires": [0, 1] },
            { "gate": { "Ry": 0.5 }, "wires": [1] },
            { "gate": "CX", "wires": [1, 2] }
        ]
    }"#;

    #[test]
    fn test_version() {
        let output = qsplit().arg("version").output().unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("qsplit"));
    }

    #[test]
    fn test_cut_json() {
        let output = qsplit()
            .args(["cut", "--benchmark", "ghz", "--qubits", "6", "-w", "4", "-f", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(plan["circuit"], "ghz_6");
        let fragments = plan["fragments"].as_array().unwrap();
        assert!(fragments.len() >= 2);
        assert!(fragments.iter().all(|f| f["wires"].as_u64().unwrap() <= 4));
        assert!(fragments.iter().all(|f| f["depth"].as_u64().unwrap() >= 1));
        assert!(plan["idle_wires"].as_array().unwrap().is_empty());

        // every operation of the 6-qubit chain lands in exactly one fragment
        let mut ops: Vec<u64> = fragments
            .iter()
            .flat_map(|f| f["operations"].as_array().unwrap().iter())
            .map(|op| op.as_u64().unwrap())
            .collect();
        ops.sort_unstable();
        assert_eq!(ops, (0..6).collect::<Vec<u64>>());
    }

    #[test]
    fn test_cut_reports_idle_wires() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idle.json");
        fs::write(
            &path,
            r#"{
                "name": "idle",
                "num_qubits": 4,
                "ops": [
                    { "gate": "H", "wires": [0] },
                    { "gate": "CX", "wires": [0, 1] },
                    { "gate": "CX", "wires": [1, 2] }
                ]
            }"#,
        )
        .unwrap();

        let output = qsplit()
            .args(["cut", "-i"])
            .arg(&path)
            .args(["-w", "2", "-f", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let idle = plan["idle_wires"].as_array().unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0]["index"], 3);
        assert_eq!(plan["solution"]["cuts"].as_array().unwrap().len(), 1);

        let fragments = plan["fragments"].as_array().unwrap();
        assert_eq!(fragments.len(), 3);
        let empty = fragments
            .iter()
            .filter(|f| f["operations"].as_array().unwrap().is_empty())
            .count();
        assert_eq!(empty, 1);
    }

    #[test]
    fn test_run_matches_uncut_simulation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, CHAIN).unwrap();

        let output = qsplit()
            .args(["run", "-i"])
            .arg(&path)
            .args(["-w", "2", "--compare", "-f", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["diagnostics"]["num_cuts"], 1);
        let tvd = report["comparison"]["total_variation_distance"]
            .as_f64()
            .unwrap();
        assert!(tvd < 1e-6);
    }

    #[test]
    fn test_missing_file_fails() {
        let output = qsplit()
            .args(["run", "-i", "/nonexistent/circuit.json", "-w", "2"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("File not found"));
    }

    #[test]
    fn test_infeasible_budget_fails() {
        let output = qsplit()
            .args(["cut", "--benchmark", "ghz", "--qubits", "4", "-w", "1"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));
    }
}
