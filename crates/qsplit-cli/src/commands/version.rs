//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - circuit cutting and distribution reconstruction",
        style("qsplit").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qsplit-ir           Circuit graph and JSON circuit format");
    println!("  qsplit-cut          Cut selection, partitioning and reconstruction");
    println!("  qsplit-adapter-sim  Statevector fragment executor");
    println!("  qsplit-cli          Command-line interface");
    println!();
    println!("License:    {}", style(env!("CARGO_PKG_LICENSE")).dim());
}
