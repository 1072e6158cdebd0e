use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use validator::Validate;

use kanal_config::{ConfigError, KanalConfig};
use kanal_telemetry::{EventLogger, MetricsRecorder};

use crate::simulation;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run broadcast rounds across one thread per process
    Simulate(SimulateArgs),
    /// Send one report between two processes and print the transport state
    StateDemo,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SimulateArgs {
    /// Configuration file; defaults to config/kanal.yaml and KANAL_* variables
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub processes: Option<usize>,
    #[arg(long)]
    pub rounds: Option<u64>,
    #[arg(long)]
    pub mean_ms: Option<u64>,
    #[arg(long)]
    pub variance_ms: Option<u64>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Print the Prometheus text exposition after the run
    #[arg(long)]
    pub metrics: bool,
}

impl SimulateArgs {
    /// Loads the layered configuration and applies flags on top.
    pub fn resolve(&self) -> Result<KanalConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => KanalConfig::load_from_path(path)?,
            None => KanalConfig::load()?,
        };
        if let Some(processes) = self.processes {
            config.transport.process_count = processes;
        }
        if let Some(rounds) = self.rounds {
            config.simulation.rounds = rounds;
        }
        if let Some(mean) = self.mean_ms {
            config.transport.mean_delay_ms = mean;
        }
        if let Some(variance) = self.variance_ms {
            config.transport.variance_ms = variance;
        }
        if self.seed.is_some() {
            config.transport.seed = self.seed;
        }
        config.telemetry.metrics |= self.metrics;
        config.validate()?;
        Ok(config)
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Simulate(args) => run_simulate(&args),
        Commands::StateDemo => {
            EventLogger::init();
            let transport = simulation::state_demo().context("state demo failed")?;
            transport.print_state();
            Ok(())
        }
    }
}

fn run_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    let config = args.resolve().context("failed to load configuration")?;
    EventLogger::init_with_filter(&config.telemetry.log_filter);
    info!(
        processes = config.transport.process_count,
        rounds = config.simulation.rounds,
        mean_delay_ms = config.transport.mean_delay_ms,
        variance_ms = config.transport.variance_ms,
        "Starting simulation"
    );

    let metrics = if config.telemetry.metrics {
        Some(MetricsRecorder::new()?)
    } else {
        None
    };
    let outcome = simulation::run_simulation(&config, metrics.as_ref())?;

    println!("{}", outcome.snapshot);
    println!(
        "{} processes x {} rounds in {:.1?}",
        outcome.reports.len(),
        config.simulation.rounds,
        outcome.elapsed
    );
    if let Some(metrics) = metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}
