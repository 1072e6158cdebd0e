//! ## kanal-cli
//! **Driver for the simulated transport**
//!
//! `kanal simulate` runs broadcast rounds with one thread per process and
//! checks that every envelope sent was delivered. `kanal state-demo` prints
//! the transport state after a single undelivered report.

use clap::Parser;

mod commands;
mod error;
mod simulation;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli)
}
