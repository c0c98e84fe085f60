//! Participation scheduler: who speaks next
//!
//! Each turn request runs one decision:
//!
//! ```text
//! pending designation for a registered worker?  -> Designated
//! no turn taken yet?                            -> Opening (default worker)
//! otherwise                                     -> Fairness
//! ```
//!
//! The fairness branch folds every worker's imbalance (expected share minus
//! actual turns) into a running budget, then picks among the least-served
//! workers the one with the highest budget, earliest registration first.
//! Whatever the branch, the chosen worker's count and the turn total go up by
//! exactly one.
//!
//! Identical histories and designations always reproduce identical
//! schedules.

pub mod fairness;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::conversation::ConversationHistory;
use crate::gateway::LedgerGateway;
use crate::ledger::LedgerStore;

pub use fairness::ParticipationTally;

/// Construction-time misconfiguration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("no workers registered")]
    NoWorkers,

    #[error("worker '{name}' registered more than once")]
    DuplicateWorker { name: String },

    #[error("default worker '{name}' is not a registered worker")]
    UnknownDefault { name: String },
}

/// Which branch produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// A worker named the next speaker through the ledger
    Designated,
    /// First turn of the session
    Opening,
    /// Long-run equal participation
    Fairness,
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Designated => write!(f, "designated"),
            Self::Opening => write!(f, "opening"),
            Self::Fairness => write!(f, "fairness"),
        }
    }
}

/// One scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub worker: String,
    pub reason: SelectionReason,
    /// 1-based turn number this selection fills
    pub turn: u64,
}

/// Turn-taking policy over a fixed, ordered worker registry.
#[derive(Debug, Clone)]
pub struct ParticipationScheduler {
    workers: Vec<String>,
    default_index: usize,
    tally: ParticipationTally,
}

impl ParticipationScheduler {
    /// Register `workers` in order. Fails fast on an empty or inconsistent registry.
    pub fn new<I, S>(workers: I, default_worker: &str) -> Result<Self, SchedulerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registered: Vec<String> = Vec::new();
        for name in workers {
            let name = name.into();
            if registered.iter().any(|w| w.eq_ignore_ascii_case(&name)) {
                return Err(SchedulerError::DuplicateWorker { name });
            }
            registered.push(name);
        }
        if registered.is_empty() {
            return Err(SchedulerError::NoWorkers);
        }
        let mut scheduler = Self {
            tally: ParticipationTally::new(registered.len()),
            workers: registered,
            default_index: 0,
        };
        scheduler.default_index =
            scheduler
                .index_of(default_worker)
                .ok_or_else(|| SchedulerError::UnknownDefault {
                    name: default_worker.to_string(),
                })?;
        Ok(scheduler)
    }

    /// Registered workers in registration order
    pub fn workers(&self) -> &[String] {
        &self.workers
    }

    pub fn default_worker(&self) -> &str {
        &self.workers[self.default_index]
    }

    pub fn total_turns(&self) -> u64 {
        self.tally.total_turns()
    }

    pub fn participation_count(&self, name: &str) -> Option<u64> {
        self.index_of(name).map(|i| self.tally.count(i))
    }

    pub fn imbalance_budget(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|i| self.tally.budget(i))
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.workers.iter().position(|w| w.eq_ignore_ascii_case(name))
    }

    /// Pick the next speaker. Consumes any pending designation in the ledger.
    pub fn select_next<S: LedgerStore>(
        &mut self,
        history: &ConversationHistory,
        gateway: &LedgerGateway<S>,
    ) -> Selection {
        let designated = gateway.consume_next_speaker().and_then(|name| {
            let found = self.index_of(&name);
            if found.is_none() {
                warn!(designation = %name, "Designation names an unknown worker; using fairness");
            }
            found
        });

        let (index, reason) = match designated {
            Some(index) => (index, SelectionReason::Designated),
            None if self.tally.total_turns() == 0 => (self.default_index, SelectionReason::Opening),
            None => {
                self.tally.accrue();
                // An empty registry is rejected at construction
                let index = self.tally.fairest().unwrap_or(self.default_index);
                (index, SelectionReason::Fairness)
            }
        };

        self.tally.record(index);
        let selection = Selection {
            worker: self.workers[index].clone(),
            reason,
            turn: self.tally.total_turns(),
        };

        if reason == SelectionReason::Fairness {
            debug!(
                worker = %selection.worker,
                turn = selection.turn,
                budget = self.tally.budget(index),
                history_len = history.len(),
                "Speaker selected"
            );
        } else {
            info!(
                worker = %selection.worker,
                turn = selection.turn,
                %reason,
                history_len = history.len(),
                "Speaker selected"
            );
        }
        selection
    }
}
