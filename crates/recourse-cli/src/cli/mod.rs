//! CLI for the recourse retry engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recourse_core::config;
use std::path::PathBuf;

use commands::{run_demo, run_policy, run_simulate, SimulateOptions};

/// Top-level CLI for the recourse retry engine.
#[derive(Debug, Parser)]
#[command(name = "recourse")]
#[command(about = "recourse: retry-with-recovery execution engine", long_about = None)]
pub struct Cli {
    /// Read policies from this file instead of ~/.config/recourse/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the hello(name, age) example: non-retryable failure, pinned recovery.
    Demo,

    /// Run a synthetic operation that fails a given number of times.
    Simulate {
        /// How many attempts fail before the operation succeeds.
        #[arg(long, default_value = "2", value_name = "N")]
        failures: u32,
        /// Failure kind raised by each failing attempt.
        #[arg(long, default_value = "Timeout")]
        kind: String,
        /// Kinds wrapped by the failure, nearest first (repeatable).
        #[arg(long = "cause", value_name = "KIND")]
        causes: Vec<String>,
        /// Start from this named policy in the config (default section otherwise).
        #[arg(long, value_name = "NAME")]
        policy: Option<String>,
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
        #[arg(long, value_name = "MS")]
        initial_delay_ms: Option<u64>,
        #[arg(long, value_name = "FACTOR")]
        multiplier: Option<f64>,
        #[arg(long, value_name = "MS")]
        max_delay_ms: Option<u64>,
        /// Never retry this kind (repeatable; added to the policy's list).
        #[arg(long = "no-retry-for", value_name = "KIND")]
        no_retry_for: Vec<String>,
        /// Call arguments as a JSON array, e.g. '["name", 99]'.
        #[arg(long, value_name = "JSON")]
        args: Option<String>,
    },

    /// Show the effective policy and its backoff schedule.
    Policy {
        /// Operation name; the default section when omitted.
        name: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Demo => run_demo().await?,
            CliCommand::Simulate {
                failures,
                kind,
                causes,
                policy,
                max_attempts,
                initial_delay_ms,
                multiplier,
                max_delay_ms,
                no_retry_for,
                args,
            } => {
                let opts = SimulateOptions {
                    failures,
                    kind,
                    causes,
                    policy,
                    max_attempts,
                    initial_delay_ms,
                    multiplier,
                    max_delay_ms,
                    no_retry_for,
                    args,
                };
                run_simulate(&cfg, &opts).await?;
            }
            CliCommand::Policy { name } => run_policy(&cfg, name.as_deref())?,
        }

        Ok(())
    }
}
