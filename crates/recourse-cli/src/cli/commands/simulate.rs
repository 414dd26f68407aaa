//! `recourse simulate` – run a synthetic operation under a policy and report
//! every attempt, wait and the final outcome.

use std::future::ready;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use recourse_core::config::{RecourseConfig, RetryConfig};
use recourse_core::engine::Engine;
use recourse_core::retry::{CallArgs, FailureRecord, RecoveryHandler, RetryPolicy, StatsObserver};

/// Flags of the `simulate` subcommand.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    pub failures: u32,
    pub kind: String,
    pub causes: Vec<String>,
    pub policy: Option<String>,
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub max_delay_ms: Option<u64>,
    pub no_retry_for: Vec<String>,
    pub args: Option<String>,
}

/// What happened during one simulated invocation.
#[derive(Debug)]
pub struct SimulationReport {
    pub attempts: u32,
    pub waits: Vec<Duration>,
    pub outcome: Result<String>,
}

/// Config section (named or default) with the command-line overrides applied.
fn effective_config(cfg: &RecourseConfig, opts: &SimulateOptions) -> RetryConfig {
    let mut section = match &opts.policy {
        Some(name) => cfg.retry_config(name).clone(),
        None => cfg.default.clone(),
    };
    if let Some(n) = opts.max_attempts {
        section.max_attempts = n;
    }
    if let Some(ms) = opts.initial_delay_ms {
        section.initial_delay_ms = ms;
    }
    if let Some(m) = opts.multiplier {
        section.multiplier = m;
    }
    if let Some(ms) = opts.max_delay_ms {
        section.max_delay_ms = Some(ms);
    }
    section.non_retryable.extend(opts.no_retry_for.iter().cloned());
    section
}

fn parse_args(raw: Option<&str>) -> Result<CallArgs> {
    match raw {
        Some(json) => serde_json::from_str(json).context("parsing --args as a JSON array"),
        None => Ok(CallArgs::new()),
    }
}

fn failure_for(opts: &SimulateOptions, attempt: u32) -> FailureRecord {
    opts.causes.iter().fold(
        FailureRecord::new(opts.kind.as_str(), format!("attempt {} failed", attempt)),
        |failure, cause| failure.caused_by(cause.as_str()),
    )
}

/// Handlers for the simulated call: a catch-all, plus one shaped like the
/// supplied arguments so it wins whenever there are any.
fn handlers(args: &CallArgs) -> Vec<RecoveryHandler<String>> {
    let mut handlers = vec![RecoveryHandler::new("fallback", || {
        Ok("recovered by fallback".to_string())
    })];
    if !args.is_empty() {
        handlers.push(RecoveryHandler::with_shape(
            "echo",
            args.shape(),
            |failure, args| Ok(format!("recovered by echo{} after {}", args, failure.kind())),
        ));
    }
    handlers
}

pub async fn simulate(policy: RetryPolicy, opts: &SimulateOptions) -> Result<SimulationReport> {
    let args = parse_args(opts.args.as_deref())?;
    let stats = Arc::new(StatsObserver::new());
    let mut engine = Engine::new().with_observer(stats.clone());
    let wrapper = engine.register("simulate", policy, handlers(&args))?;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let failures = opts.failures;
    let outcome = wrapper
        .run(args, |call| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(attempt, args = %call, "simulated call");
            if attempt <= failures {
                ready(Err(failure_for(opts, attempt)))
            } else {
                ready(Ok(format!("ok on attempt {}", attempt)))
            }
        })
        .await
        .map_err(anyhow::Error::from);

    Ok(SimulationReport {
        attempts: calls.load(Ordering::SeqCst),
        waits: stats.delays(),
        outcome,
    })
}

pub async fn run_simulate(cfg: &RecourseConfig, opts: &SimulateOptions) -> Result<()> {
    let section = effective_config(cfg, opts);
    let policy = section.to_policy().context("invalid retry policy")?;
    let report = simulate(policy, opts).await?;

    tracing::info!(
        attempts = report.attempts,
        waits = report.waits.len(),
        "simulation finished"
    );
    println!("attempts: {}", report.attempts);
    if report.waits.is_empty() {
        println!("waits:    -");
    } else {
        let waits: Vec<String> = report.waits.iter().map(|d| format!("{:?}", d)).collect();
        println!("waits:    {}", waits.join(", "));
    }
    match report.outcome {
        Ok(value) => {
            println!("outcome:  {}", value);
            Ok(())
        }
        Err(err) => Err(err.context("simulated operation failed")),
    }
}
