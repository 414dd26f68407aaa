use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{PolicyError, RetryPolicy};

/// Retry policy parameters (one `[default]` or `[policies.<name>]` section).
///
/// Missing keys fall back to the built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Growth factor applied to the delay after each further attempt.
    pub multiplier: f64,
    /// Optional ceiling on a single delay, in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Failure kinds that are never retried.
    pub non_retryable: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: None,
            non_retryable: Vec::new(),
        }
    }
}

impl RetryConfig {
    /// Validate and convert into an immutable policy.
    pub fn to_policy(&self) -> Result<RetryPolicy, PolicyError> {
        let mut builder = RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .multiplier(self.multiplier);
        if let Some(ms) = self.max_delay_ms {
            builder = builder.max_delay(Duration::from_millis(ms));
        }
        for kind in &self.non_retryable {
            builder = builder.no_retry_for(kind.as_str());
        }
        builder.build()
    }
}

/// Global configuration loaded from `~/.config/recourse/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecourseConfig {
    /// Policy for operations without their own section.
    #[serde(default)]
    pub default: RetryConfig,
    /// Per-operation policies, keyed by operation name.
    #[serde(default)]
    pub policies: BTreeMap<String, RetryConfig>,
}

impl RecourseConfig {
    /// Section for `name`, or the default section.
    pub fn retry_config(&self, name: &str) -> &RetryConfig {
        self.policies.get(name).unwrap_or(&self.default)
    }

    pub fn policy(&self, name: &str) -> Result<RetryPolicy, PolicyError> {
        self.retry_config(name).to_policy()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("recourse")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RecourseConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RecourseConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<RecourseConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: RecourseConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let cfg = RecourseConfig::default();
        assert_eq!(cfg.default.max_attempts, 5);
        assert_eq!(cfg.default.initial_delay_ms, 100);
        assert!((cfg.default.multiplier - 2.0).abs() < 1e-9);
        assert!(cfg.default.max_delay_ms.is_none());
        assert!(cfg.policies.is_empty());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = RecourseConfig::default();
        cfg.policies.insert(
            "hello".into(),
            RetryConfig {
                non_retryable: vec!["IllegalArgument".into()],
                ..RetryConfig::default()
            },
        );
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RecourseConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn named_section_fills_missing_keys_from_defaults() {
        let toml = r#"
            [default]
            max_attempts = 3

            [policies.fetch]
            initial_delay_ms = 250
            max_delay_ms = 1000
            non_retryable = ["NotFound", "Forbidden"]
        "#;
        let cfg: RecourseConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.default.max_attempts, 3);
        let fetch = cfg.retry_config("fetch");
        assert_eq!(fetch.max_attempts, 5);
        assert_eq!(fetch.initial_delay_ms, 250);

        let policy = cfg.policy("fetch").unwrap();
        assert_eq!(policy.max_delay(), Some(Duration::from_millis(1000)));
        assert!(policy.non_retryable_kinds().contains("NotFound"));
        assert!(policy.non_retryable_kinds().contains("Forbidden"));

        assert_eq!(cfg.policy("unknown").unwrap().max_attempts(), 3);
    }

    #[test]
    fn invalid_section_fails_validation() {
        let toml = r#"
            [policies.broken]
            multiplier = 0.5
        "#;
        let cfg: RecourseConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            cfg.policy("broken"),
            Err(PolicyError::InvalidMultiplier(0.5))
        );
    }

    #[test]
    fn load_from_path_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[default]\nmax_attempts = 7").unwrap();
        let cfg = load_from_path(f.path()).unwrap();
        assert_eq!(cfg.default.max_attempts, 7);
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[default\nmax_attempts = ").unwrap();
        let err = load_from_path(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
    }
}
