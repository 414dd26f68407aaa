//! `recourse policy [NAME]` – show the effective policy and its backoff schedule.

use anyhow::{Context, Result};
use recourse_core::config::RecourseConfig;
use recourse_core::retry::RetryPolicy;

fn describe(label: &str, policy: &RetryPolicy) -> Vec<String> {
    let cap = policy
        .max_delay()
        .map(|d| format!("{:?}", d))
        .unwrap_or_else(|| "none".to_string());
    let excluded: Vec<&str> = policy.non_retryable_kinds().iter().map(|k| k.as_str()).collect();
    let mut lines = vec![
        format!("policy:        {}", label),
        format!("max attempts:  {}", policy.max_attempts()),
        format!("initial delay: {:?}", policy.initial_delay()),
        format!("multiplier:    {}", policy.multiplier()),
        format!("max delay:     {}", cap),
        format!(
            "no retry for:  {}",
            if excluded.is_empty() {
                "-".to_string()
            } else {
                excluded.join(", ")
            }
        ),
        "schedule:".to_string(),
    ];
    let schedule = policy.schedule();
    if schedule.is_empty() {
        lines.push("  (single attempt, no waits)".to_string());
    }
    for (i, wait) in schedule.iter().enumerate() {
        lines.push(format!("  after attempt {:<3} wait {:?}", i + 1, wait));
    }
    lines
}

pub fn run_policy(cfg: &RecourseConfig, name: Option<&str>) -> Result<()> {
    let (label, section) = match name {
        Some(n) if cfg.policies.contains_key(n) => (n.to_string(), cfg.retry_config(n)),
        Some(n) => (format!("{} (default)", n), &cfg.default),
        None => ("default".to_string(), &cfg.default),
    };
    let policy = section
        .to_policy()
        .with_context(|| format!("policy {} is invalid", label))?;
    for line in describe(&label, &policy) {
        println!("{}", line);
    }
    Ok(())
}
