//! Conversation loop: drives one analysis session to completion
//!
//! ## Lifecycle
//!
//! ```text
//! ConversationLoop::run(raw_text)
//!   → open ledger, seed history
//!   → loop:
//!       check cancellation
//!       scheduler.select_next(history, ledger)   # who speaks
//!       worker.take_turn(ctx)                    # on its own task
//!         Ok(msg)                 → append to history
//!         Err(TransportTerminated) → end gracefully
//!         Err(other) / panic      → ledger.log_error, keep going
//!       termination.check(ledger, total_turns)   # conclusion or ceiling
//!   → SessionOutcome
//! ```
//!
//! Turns are strictly sequential. The only suspension point is the worker's
//! turn; nothing else touches the ledger while it runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use argument_coordination::{
    ChatMessage, ConversationHistory, LedgerGateway, LedgerSnapshot, MessageRole,
    ParticipationScheduler, Selection, SnapshotView, TerminationPolicy,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::errors::{SessionError, WorkerError};
use crate::events::{SessionEnd, SessionEvent, SharedEventBus};
use crate::telemetry::{append_telemetry, SessionTelemetry, TurnOutcome};
use crate::worker::{TurnContext, Worker, WorkerMessage};

/// Speaker name attached to the seeded raw text
const USER_SPEAKER: &str = "user";

/// Everything a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub end: SessionEnd,
    /// Turns taken, including failed ones
    pub turns: u64,
    pub history: ConversationHistory,
    /// Full ledger snapshot at the end of the session
    pub ledger: LedgerSnapshot,
    pub telemetry: SessionTelemetry,
}

impl SessionOutcome {
    pub fn conclusion(&self) -> Option<&str> {
        self.ledger.final_conclusion()
    }
}

/// Turn-by-turn driver over a fixed set of workers.
pub struct ConversationLoop {
    config: SessionConfig,
    /// Workers in registration order
    roster: Vec<(String, Arc<dyn Worker>)>,
    /// Fresh scheduler state, cloned for every run
    scheduler: ParticipationScheduler,
    events: Option<SharedEventBus>,
    telemetry_path: Option<PathBuf>,
    cancel: CancellationToken,
}

impl ConversationLoop {
    /// Build a loop, failing fast on misconfiguration.
    ///
    /// Every configured worker name needs a matching implementation; extra
    /// implementations are ignored.
    pub fn new(config: SessionConfig, workers: Vec<Arc<dyn Worker>>) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::Configuration)?;
        let scheduler =
            ParticipationScheduler::new(config.workers.iter().cloned(), &config.default_worker)?;

        let mut roster = Vec::with_capacity(config.workers.len());
        for name in &config.workers {
            let worker = workers
                .iter()
                .find(|w| w.name() == *name)
                .cloned()
                .ok_or_else(|| SessionError::MissingWorker(name.clone()))?;
            roster.push((name.clone(), worker));
        }
        for worker in &workers {
            let name = worker.name();
            if !config.workers.contains(&name) {
                warn!(worker = %name, "Worker implementation not in configuration; ignoring");
            }
        }

        Ok(Self {
            config,
            roster,
            scheduler,
            events: None,
            telemetry_path: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Append session telemetry to this JSONL file when the session ends
    pub fn with_telemetry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.telemetry_path = Some(path.into());
        self
    }

    /// Token that stops the session before its next turn
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn publish(&self, event: SessionEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    fn worker(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.roster
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, worker)| Arc::clone(worker))
    }

    /// Run one session over `raw_text` until a stop condition.
    pub async fn run(&self, raw_text: &str) -> SessionOutcome {
        let session_id = uuid::Uuid::new_v4().to_string();
        let gateway = LedgerGateway::open(raw_text);
        let policy = TerminationPolicy::new(self.config.max_steps);
        let mut history = ConversationHistory::new();
        let mut telemetry = SessionTelemetry::new(&session_id);

        if self.config.seed_history {
            history.push(ChatMessage::new(USER_SPEAKER, MessageRole::User, raw_text));
        }

        let mut scheduler = self.scheduler.clone();
        let names = scheduler.workers().to_vec();

        info!(
            session_id = %session_id,
            workers = ?names,
            max_steps = self.config.max_steps,
            "Session starting"
        );
        self.publish(SessionEvent::SessionStarted {
            session_id: session_id.clone(),
            workers: names,
            timestamp: Utc::now(),
        });

        let end = loop {
            if self.cancel.is_cancelled() {
                info!(session_id = %session_id, "Session cancelled");
                break SessionEnd::Cancelled;
            }

            let selection = scheduler.select_next(&history, &gateway);
            self.publish(SessionEvent::SpeakerSelected {
                session_id: session_id.clone(),
                turn: selection.turn,
                worker: selection.worker.clone(),
                reason: selection.reason,
                timestamp: Utc::now(),
            });

            let started = Instant::now();
            let result = self.run_turn(&selection, &history, &gateway).await;
            let elapsed = started.elapsed();

            match result {
                Ok(message) => {
                    history.push(ChatMessage::new(
                        selection.worker.as_str(),
                        message.role,
                        message.content,
                    ));
                    telemetry.record_turn(
                        selection.turn,
                        &selection.worker,
                        selection.reason,
                        elapsed,
                        TurnOutcome::Completed,
                    );
                    self.publish(SessionEvent::TurnCompleted {
                        session_id: session_id.clone(),
                        turn: selection.turn,
                        worker: selection.worker.clone(),
                        timestamp: Utc::now(),
                    });
                }
                Err(e) if e.is_transport_terminated() => {
                    info!(
                        session_id = %session_id,
                        worker = %selection.worker,
                        turn = selection.turn,
                        reason = %e,
                        "Conversation transport finished; ending session"
                    );
                    telemetry.record_turn(
                        selection.turn,
                        &selection.worker,
                        selection.reason,
                        elapsed,
                        TurnOutcome::TransportFinished,
                    );
                    break SessionEnd::TransportFinished;
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        session_id = %session_id,
                        worker = %selection.worker,
                        turn = selection.turn,
                        error = %message,
                        "Worker turn failed; continuing"
                    );
                    if let Err(log_err) = gateway.log_error(&selection.worker, &message) {
                        error!(error = %log_err, "Failed to record worker error in ledger");
                    }
                    telemetry.record_turn(
                        selection.turn,
                        &selection.worker,
                        selection.reason,
                        elapsed,
                        TurnOutcome::WorkerFailed {
                            error: message.clone(),
                        },
                    );
                    self.publish(SessionEvent::WorkerFailed {
                        session_id: session_id.clone(),
                        turn: selection.turn,
                        worker: selection.worker.clone(),
                        error: message,
                        timestamp: Utc::now(),
                    });
                }
            }

            if let Some(reason) = policy.check(&gateway, scheduler.total_turns()) {
                info!(session_id = %session_id, %reason, turns = scheduler.total_turns(), "Session stopping");
                break SessionEnd::Stopped { reason };
            }
        };

        let turns = scheduler.total_turns();
        self.finish(session_id, end, turns, history, &gateway, telemetry)
    }

    /// Run the selected worker's turn on its own task so a panic stays contained.
    async fn run_turn(
        &self,
        selection: &Selection,
        history: &ConversationHistory,
        gateway: &LedgerGateway,
    ) -> Result<WorkerMessage, WorkerError> {
        let worker = self.worker(&selection.worker).ok_or_else(|| {
            WorkerError::Internal(anyhow::anyhow!(
                "no implementation registered for '{}'",
                selection.worker
            ))
        })?;

        let ctx = TurnContext {
            turn: selection.turn,
            history: history.clone(),
            snapshot: gateway.get_snapshot(self.config.snapshot_view),
            ledger: gateway.clone(),
        };

        // Dropping `run` mid-turn must not leave the worker mutating the ledger
        let handle =
            AbortOnDropHandle::new(tokio::spawn(async move { worker.take_turn(&ctx).await }));
        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => Err(WorkerError::Panicked(panic_message(join_err))),
            Err(join_err) => Err(WorkerError::Internal(anyhow::anyhow!(
                "worker task did not complete: {join_err}"
            ))),
        }
    }

    fn finish(
        &self,
        session_id: String,
        end: SessionEnd,
        turns: u64,
        history: ConversationHistory,
        gateway: &LedgerGateway,
        mut telemetry: SessionTelemetry,
    ) -> SessionOutcome {
        telemetry.finish(end.clone());
        if let Some(path) = &self.telemetry_path {
            append_telemetry(&telemetry, path);
        }

        info!(session_id = %session_id, %end, turns, "Session ended");
        self.publish(SessionEvent::SessionEnded {
            session_id: session_id.clone(),
            turns,
            end: end.clone(),
            timestamp: Utc::now(),
        });

        SessionOutcome {
            session_id,
            end,
            turns,
            history,
            ledger: gateway.get_snapshot(SnapshotView::Full),
            telemetry,
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::MockWorker;

    fn mock(name: &'static str) -> MockWorker {
        let mut worker = MockWorker::new();
        worker.expect_name().return_const(name.to_string());
        worker
    }

    fn replying(name: &'static str) -> Arc<dyn Worker> {
        let mut worker = mock(name);
        worker
            .expect_take_turn()
            .returning(move |ctx| Ok(WorkerMessage::assistant(format!("{name} turn {}", ctx.turn))));
        Arc::new(worker)
    }

    fn two_worker_config(max_steps: u64) -> SessionConfig {
        SessionConfig::default()
            .with_workers(["Lead", "Critic"], "Lead")
            .with_max_steps(max_steps)
    }

    #[test]
    fn test_missing_worker_implementation_rejected() {
        let result = ConversationLoop::new(two_worker_config(3), vec![replying("Lead")]);
        assert!(matches!(result, Err(SessionError::MissingWorker(name)) if name == "Critic"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = two_worker_config(0);
        let result = ConversationLoop::new(config, vec![replying("Lead"), replying("Critic")]);
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_inference_failure_logged_and_session_continues() {
        let mut failing = mock("Critic");
        failing
            .expect_take_turn()
            .returning(|_| Err(WorkerError::Inference("backend timeout".to_string())));

        let failing: Arc<dyn Worker> = Arc::new(failing);

        let session =
            ConversationLoop::new(two_worker_config(4), vec![replying("Lead"), failing]).unwrap();
        let outcome = session.run("T").await;

        assert_eq!(outcome.turns, 4);
        assert_eq!(
            outcome.end,
            SessionEnd::Stopped {
                reason: argument_coordination::StopReason::StepCeilingReached { max_steps: 4 }
            }
        );
        let full = outcome.ledger.as_full().unwrap();
        assert_eq!(full.errors.len(), 2);
        assert!(full.errors.iter().all(|e| e.worker_name == "Critic"));
        assert!(full.errors[0].message.contains("backend timeout"));
        assert_eq!(outcome.telemetry.failed_turns(), 2);
        // user seed + two Lead messages
        assert_eq!(outcome.history.len(), 3);
    }

    /// Parks its gateway where the test can see it, then stalls before writing.
    struct StallingWorker {
        name: &'static str,
        seen: Arc<std::sync::Mutex<Option<LedgerGateway>>>,
    }

    #[async_trait::async_trait]
    impl Worker for StallingWorker {
        fn name(&self) -> String {
            self.name.to_string()
        }

        async fn take_turn(&self, ctx: &TurnContext) -> Result<WorkerMessage, WorkerError> {
            if let Ok(mut seen) = self.seen.lock() {
                *seen = Some(ctx.ledger.clone());
            }
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            ctx.ledger
                .add_argument("written after the session was abandoned")
                .map_err(|e| WorkerError::Inference(e.to_string()))?;
            Ok(WorkerMessage::assistant("late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_aborts_in_flight_turn() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let lead: Arc<dyn Worker> = Arc::new(StallingWorker {
            name: "Lead",
            seen: Arc::clone(&seen),
        });
        let session = ConversationLoop::new(two_worker_config(3), vec![lead, replying("Critic")])
            .unwrap();

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_secs(1), session.run("T")).await;
        assert!(timed_out.is_err());

        // Well past the worker's wake-up; an orphaned task would have written by now
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        let gateway = seen.lock().unwrap().clone().unwrap();
        assert_eq!(gateway.inspect(|l| l.identified_arguments().len()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_turn() {
        let session = ConversationLoop::new(
            two_worker_config(10),
            vec![replying("Lead"), replying("Critic")],
        )
        .unwrap();
        session.cancellation_token().cancel();
        let outcome = session.run("T").await;
        assert_eq!(outcome.end, SessionEnd::Cancelled);
        assert_eq!(outcome.turns, 0);
    }
}
