//! `report-builder` command-line entry point.
//!
//! ```text
//! main()
//!   ├─> parse arguments (clap)
//!   ├─> install logging (stderr + rotating files)
//!   └─> run the subcommand on a tokio runtime
//! ```

#![expect(clippy::print_stdout)] // Command results go to stdout
#![expect(clippy::print_stderr)]

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // Not fatal: the command still runs without file logs.
    if let Err(e) = report_builder::logging::init_with_level(level) {
        eprintln!("warning: file logging disabled: {e:#}");
    }

    tokio::runtime::Runtime::new()?.block_on(cli::run_command(cli.command))
}
