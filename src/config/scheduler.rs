//! Scheduler configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::gate::DEFAULT_MAX_CONCURRENT;

/// Environment variable overriding [`SchedulerConfig::max_concurrent`].
pub const ENV_MAX_CONCURRENT: &str = "JOB_SCHEDULER_MAX_CONCURRENT";
/// Environment variable overriding [`SchedulerConfig::tick_interval_ms`].
pub const ENV_TICK_INTERVAL_MS: &str = "JOB_SCHEDULER_TICK_INTERVAL_MS";
/// Environment variable overriding [`SchedulerConfig::transition_log_capacity`].
pub const ENV_TRANSITION_LOG_CAPACITY: &str = "JOB_SCHEDULER_TRANSITION_LOG_CAPACITY";

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_transition_log_capacity() -> usize {
    1024
}

const fn default_true() -> bool {
    true
}

/// Settings for the local process launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Parse JSON-object stdout lines as progress events.
    #[serde(default = "default_true")]
    pub progress_from_stdout: bool,
    /// Working directory for commands that do not set one.
    #[serde(default)]
    pub default_cwd: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            progress_from_stdout: true,
            default_cwd: None,
        }
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum simultaneously running jobs.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Interval between scheduling ticks in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Entries kept by the in-memory transition log.
    #[serde(default = "default_transition_log_capacity")]
    pub transition_log_capacity: usize,
    /// Local launcher settings.
    #[serde(default)]
    pub launcher: LauncherConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            tick_interval_ms: default_tick_interval_ms(),
            transition_log_capacity: default_transition_log_capacity(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".into());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".into());
        }
        if let Some(cwd) = &self.launcher.default_cwd {
            if cwd.as_os_str().is_empty() {
                return Err("launcher.default_cwd must not be empty".into());
            }
        }
        Ok(())
    }

    /// Tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Use one concurrency slot per logical CPU.
    #[must_use]
    pub fn with_cpu_concurrency(mut self) -> Self {
        self.max_concurrent = num_cpus::get().max(1);
        self
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from defaults overridden through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT) {
            cfg.max_concurrent = parse_var(ENV_MAX_CONCURRENT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TICK_INTERVAL_MS) {
            cfg.tick_interval_ms = parse_var(ENV_TICK_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TRANSITION_LOG_CAPACITY) {
            cfg.transition_log_capacity = parse_var(ENV_TRANSITION_LOG_CAPACITY, &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N, String>
where
    N::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}: invalid value `{raw}`: {e}"))
}
