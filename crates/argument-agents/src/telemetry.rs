//! Tracing initialization and per-session turn telemetry.
//!
//! One [`TurnRecord`] per turn is collected into [`SessionTelemetry`], which
//! can be appended as a single JSON line to a telemetry file.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use argument_coordination::SelectionReason;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::events::SessionEnd;

/// Install the global `tracing` subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`. Safe to call more than once; only
/// the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

/// How a single turn went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    WorkerFailed { error: String },
    TransportFinished,
}

/// Metrics for a single turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub turn: u64,
    pub worker: String,
    pub reason: SelectionReason,
    pub duration_ms: u64,
    pub outcome: TurnOutcome,
}

/// Metrics for one session, appended as a single JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTelemetry {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end: Option<SessionEnd>,
    pub turns: Vec<TurnRecord>,
}

impl SessionTelemetry {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            end: None,
            turns: Vec::new(),
        }
    }

    pub fn record_turn(
        &mut self,
        turn: u64,
        worker: &str,
        reason: SelectionReason,
        elapsed: Duration,
        outcome: TurnOutcome,
    ) {
        self.turns.push(TurnRecord {
            turn,
            worker: worker.to_string(),
            reason,
            duration_ms: elapsed.as_millis() as u64,
            outcome,
        });
    }

    pub fn finish(&mut self, end: SessionEnd) {
        self.ended_at = Some(Utc::now());
        self.end = Some(end);
    }

    pub fn failed_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| matches!(t.outcome, TurnOutcome::WorkerFailed { .. }))
            .count()
    }

    /// Turns taken by `worker`
    pub fn turns_by(&self, worker: &str) -> usize {
        self.turns.iter().filter(|t| t.worker == worker).count()
    }
}

/// Append the session's telemetry as one JSON line to `path`, creating
/// missing parent directories. Failures are logged, never raised.
pub fn append_telemetry(telemetry: &SessionTelemetry, path: &Path) {
    if let Err(e) = write_line(telemetry, path) {
        warn!(
            session_id = %telemetry.session_id,
            path = %path.display(),
            error = %format_args!("{e:#}"),
            "Failed to append session telemetry"
        );
        return;
    }
    info!(
        session_id = %telemetry.session_id,
        turns = telemetry.turns.len(),
        path = %path.display(),
        "Appended session telemetry"
    );
}

fn write_line(telemetry: &SessionTelemetry, path: &Path) -> anyhow::Result<()> {
    use std::io::Write;

    let line = serde_json::to_string(telemetry).context("serialize telemetry")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    writeln!(file, "{line}").context("write telemetry line")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argument_coordination::StopReason;

    fn sample() -> SessionTelemetry {
        let mut telemetry = SessionTelemetry::new("s-1");
        telemetry.record_turn(
            1,
            "Orchestrator",
            SelectionReason::Opening,
            Duration::from_millis(12),
            TurnOutcome::Completed,
        );
        telemetry.record_turn(
            2,
            "LogicWorker",
            SelectionReason::Fairness,
            Duration::from_millis(3),
            TurnOutcome::WorkerFailed {
                error: "inference failed: timeout".to_string(),
            },
        );
        telemetry.finish(SessionEnd::Stopped {
            reason: StopReason::StepCeilingReached { max_steps: 2 },
        });
        telemetry
    }

    #[test]
    fn test_record_and_summarize() {
        let telemetry = sample();
        assert_eq!(telemetry.turns.len(), 2);
        assert_eq!(telemetry.failed_turns(), 1);
        assert_eq!(telemetry.turns_by("Orchestrator"), 1);
        assert!(telemetry.ended_at.is_some());
    }

    #[test]
    fn test_append_writes_one_line_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");

        append_telemetry(&sample(), &path);
        append_telemetry(&sample(), &path);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["session_id"], "s-1");
        assert_eq!(value["turns"][0]["reason"], "opening");
        assert_eq!(value["turns"][1]["outcome"]["worker_failed"]["error"], "inference failed: timeout");
    }

    #[test]
    fn test_append_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("2026").join("telemetry.jsonl");

        append_telemetry(&sample(), &path);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_append_under_a_file_is_logged_not_raised() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let path = blocker.path().join("telemetry.jsonl");

        append_telemetry(&sample(), &path);

        assert!(!path.exists());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
