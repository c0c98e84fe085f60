//! Session configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (`ARGUMENT_MAX_STEPS`, `ARGUMENT_DEFAULT_WORKER`)
//! 2. Values from a TOML file ([`SessionConfig::from_toml_file`])
//! 3. Built-in defaults (20 steps, four workers opened by `Orchestrator`)

use std::collections::HashSet;
use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use argument_coordination::{SnapshotView, DEFAULT_MAX_STEPS};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_WORKER: &str = "Orchestrator";
const DEFAULT_WORKERS: [&str; 4] = ["Orchestrator", "LogicWorker", "InformalWorker", "ExtractWorker"];

const ENV_MAX_STEPS: &str = "ARGUMENT_MAX_STEPS";
const ENV_DEFAULT_WORKER: &str = "ARGUMENT_DEFAULT_WORKER";

/// Everything needed to start one analysis session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Step ceiling; the session stops after this many turns
    pub max_steps: u64,
    /// Worker that opens the session
    pub default_worker: String,
    /// Worker names in registration order
    pub workers: Vec<String>,
    /// Snapshot view handed to workers each turn
    pub snapshot_view: SnapshotView,
    /// Open the history with the raw text as a user message
    pub seed_history: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            default_worker: DEFAULT_WORKER.to_string(),
            workers: DEFAULT_WORKERS.iter().map(|w| w.to_string()).collect(),
            snapshot_view: SnapshotView::Summary,
            seed_history: true,
        }
    }
}

impl SessionConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session config {}", path.display()))?;
        let config: SessionConfig =
            toml::from_str(&content).context("Failed to parse session config TOML")?;
        Ok(config.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = env::var(ENV_MAX_STEPS) {
            match raw.trim().parse::<u64>() {
                Ok(steps) => self.max_steps = steps,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {ENV_MAX_STEPS}"),
            }
        }
        if let Ok(worker) = env::var(ENV_DEFAULT_WORKER) {
            let worker = worker.trim();
            if !worker.is_empty() {
                self.default_worker = worker.to_string();
            }
        }
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_workers<I, S>(mut self, workers: I, default_worker: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workers = workers.into_iter().map(Into::into).collect();
        self.default_worker = default_worker.to_string();
        self
    }

    /// Describe the first problem, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("max_steps must be at least 1".to_string());
        }
        if self.workers.is_empty() {
            return Err("at least one worker must be registered".to_string());
        }
        let mut seen = HashSet::new();
        for worker in &self.workers {
            if worker.trim().is_empty() {
                return Err("worker names must not be empty".to_string());
            }
            if !seen.insert(worker.to_ascii_lowercase()) {
                return Err(format!("worker '{}' is registered more than once", worker));
            }
        }
        let default_worker = self.default_worker.trim();
        if !self.workers.iter().any(|w| w.eq_ignore_ascii_case(default_worker)) {
            return Err(format!(
                "default worker '{}' is not one of the registered workers",
                self.default_worker
            ));
        }
        Ok(())
    }
}
