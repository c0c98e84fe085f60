//! Serializable views of the ledger handed to workers.

use serde::{Deserialize, Serialize};

use super::types::{Answer, BeliefSet, ErrorRecord, Fallacy, OrderedMap, QueryRecord, Registry};

/// How much of the ledger a snapshot carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotView {
    /// Counts and headline ids only
    #[default]
    Summary,
    /// The entire ledger
    Full,
}

impl SnapshotView {
    /// Map the boolean `summarized` flag workers send
    pub fn from_summarized(summarized: bool) -> Self {
        if summarized {
            Self::Summary
        } else {
            Self::Full
        }
    }
}

/// Counts and headline ids.
#[derive(Debug, Clone, Serialize)]
pub struct SummarySnapshot {
    pub raw_text: String,
    pub task_count: usize,
    pub argument_count: usize,
    pub fallacy_count: usize,
    pub belief_set_count: usize,
    pub query_count: usize,
    pub answer_count: usize,
    pub error_count: usize,
    pub task_ids: Vec<String>,
    pub argument_ids: Vec<String>,
    pub fallacy_ids: Vec<String>,
    pub answered_task_ids: Vec<String>,
    pub final_conclusion: Option<String>,
    pub next_speaker_pending: bool,
}

/// Complete copy of the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct FullSnapshot {
    pub raw_text: String,
    pub analysis_tasks: Registry<String>,
    pub identified_arguments: Registry<String>,
    pub identified_fallacies: Registry<Fallacy>,
    pub belief_sets: Registry<BeliefSet>,
    pub query_log: Vec<QueryRecord>,
    pub answers: OrderedMap<Answer>,
    pub errors: Vec<ErrorRecord>,
    pub final_conclusion: Option<String>,
    pub next_speaker: Option<String>,
}

/// Snapshot could not be produced; carries the reason instead of failing the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotFailure {
    pub error: String,
}

/// A point-in-time view of the ledger.
///
/// Serializes untagged, so a worker sees either the summary object, the full
/// object, or `{"error": "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LedgerSnapshot {
    Summary(SummarySnapshot),
    Full(Box<FullSnapshot>),
    Unavailable(SnapshotFailure),
}

impl LedgerSnapshot {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::Unavailable(SnapshotFailure {
            error: error.into(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }

    pub fn as_summary(&self) -> Option<&SummarySnapshot> {
        match self {
            Self::Summary(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn as_full(&self) -> Option<&FullSnapshot> {
        match self {
            Self::Full(full) => Some(&**full),
            _ => None,
        }
    }

    /// The conclusion, if this view carries one
    pub fn final_conclusion(&self) -> Option<&str> {
        match self {
            Self::Summary(summary) => summary.final_conclusion.as_deref(),
            Self::Full(full) => full.final_conclusion.as_deref(),
            Self::Unavailable(_) => None,
        }
    }

    /// Render as JSON text for a text-generating caller.
    pub fn to_json_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("snapshot serialization failed: {e}") })
                .to_string()
        })
    }
}
