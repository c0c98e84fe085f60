//! Ledger gateway: the only sanctioned mutation/query surface for workers
//!
//! Every call takes the ledger lock, runs exactly one store operation, and
//! converts whatever the store does into a tagged result:
//!
//! - value-producing calls return the id or content directly
//! - mutating calls with no natural value return an [`Ack`]
//! - store errors become [`GatewayError`]s tagged `validation` or `internal`
//! - a panic inside the store is caught, logged with full detail, and
//!   surfaced as a generic `internal` error
//!
//! Nothing raised inside the ledger crosses this boundary. `get_snapshot`
//! never fails; its failure path is [`LedgerSnapshot::Unavailable`].
//!
//! The ledger lives behind `Arc<Mutex<_>>`. Turns are sequential, but the
//! lock keeps read-then-clear designation consumption atomic should workers
//! ever overlap.

pub mod result;
pub mod tools;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::ledger::{
    AnswerOutcome, ConclusionOutcome, Ledger, LedgerSnapshot, LedgerStore, SnapshotView,
};

pub use result::{Ack, GatewayError, GatewayErrorKind, GatewayResult, RenderForWorker};
pub use tools::{dispatch, tool_definitions, GatewayTool, ToolDefinition};

/// Thread-safe ledger handle
pub type SharedLedger<S> = Arc<Mutex<S>>;

/// Capability object handed to each worker turn.
///
/// Cloning is cheap and every clone drives the same ledger.
pub struct LedgerGateway<S: LedgerStore = Ledger> {
    ledger: SharedLedger<S>,
}

impl<S: LedgerStore> Clone for LedgerGateway<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl LedgerGateway<Ledger> {
    /// Open a fresh in-memory ledger for `raw_text`
    pub fn open(raw_text: impl Into<String>) -> Self {
        Self::new(Ledger::new(raw_text))
    }
}

impl<S: LedgerStore> LedgerGateway<S> {
    /// Wrap an existing store
    pub fn new(store: S) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Ledger lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Run one store operation under the lock with failures and panics captured.
    fn guarded<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut S) -> crate::ledger::LedgerResult<T>,
    ) -> GatewayResult<T> {
        let mut guard = self.lock();
        match panic::catch_unwind(AssertUnwindSafe(|| op(&mut *guard))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_validation() => {
                warn!(operation, error = %e, "Ledger rejected call");
                Err(GatewayError::from_ledger(operation, &e))
            }
            Ok(Err(e)) => {
                error!(operation, error = %e, "Ledger operation failed");
                Err(GatewayError::from_ledger(operation, &e))
            }
            Err(payload) => {
                error!(
                    operation,
                    panic = %panic_message(payload.as_ref()),
                    "Ledger operation panicked"
                );
                Err(GatewayError::internal(operation))
            }
        }
    }

    /// Register an analysis task
    pub fn add_task(&self, description: &str) -> GatewayResult<String> {
        self.guarded("add_task", |ledger| ledger.add_task(description))
    }

    /// Record an argument found in the text
    pub fn add_argument(&self, description: &str) -> GatewayResult<String> {
        self.guarded("add_argument", |ledger| ledger.add_argument(description))
    }

    /// Record a fallacy, optionally tied to an argument
    pub fn add_fallacy(
        &self,
        fallacy_type: &str,
        justification: &str,
        target_argument_id: Option<&str>,
    ) -> GatewayResult<String> {
        let target = target_argument_id
            .map(clean_token)
            .filter(|id| !id.is_empty());
        self.guarded("add_fallacy", |ledger| {
            ledger.add_fallacy(fallacy_type, justification, target)
        })
    }

    /// Store a belief set; the logic type is cleaned before the ledger resolves aliases
    pub fn add_belief_set(&self, logic_type: &str, content: &str) -> GatewayResult<String> {
        let logic_type = clean_token(logic_type);
        self.guarded("add_belief_set", |ledger| {
            ledger.add_belief_set(logic_type, content)
        })
    }

    /// Log a query against a belief set and its raw result
    pub fn log_query(
        &self,
        belief_set_id: &str,
        query: &str,
        raw_result: &str,
    ) -> GatewayResult<String> {
        let belief_set_id = clean_token(belief_set_id);
        self.guarded("log_query", |ledger| {
            ledger.log_query(belief_set_id, query, raw_result)
        })
    }

    /// Record the answer to a task
    pub fn add_answer(
        &self,
        task_id: &str,
        author: &str,
        text: &str,
        source_ids: &[String],
    ) -> GatewayResult<Ack> {
        let task_id = clean_token(task_id);
        let sources: Vec<String> = source_ids
            .iter()
            .map(|id| clean_token(id).to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let outcome = self.guarded("add_answer", |ledger| {
            ledger.add_answer(task_id, author, text, &sources)
        })?;
        Ok(match outcome {
            AnswerOutcome::Recorded => Ack::with_detail(format!("answer recorded for {task_id}")),
            AnswerOutcome::Replaced { previous_author } => Ack::with_detail(format!(
                "answer for {task_id} replaced the previous answer by {previous_author}"
            )),
        })
    }

    /// Set the session's final conclusion
    pub fn set_conclusion(&self, text: &str) -> GatewayResult<Ack> {
        let outcome = self.guarded("set_conclusion", |ledger| ledger.set_conclusion(text))?;
        info!("Final conclusion recorded");
        Ok(match outcome {
            ConclusionOutcome::Set => Ack::ok(),
            ConclusionOutcome::Replaced { .. } => {
                Ack::with_detail("previous conclusion replaced")
            }
        })
    }

    /// Name the worker that must act next
    pub fn designate_next_speaker(&self, name: &str) -> GatewayResult<Ack> {
        let name = clean_token(name);
        if name.is_empty() {
            return Err(GatewayError::validation(
                "designate_next_speaker",
                "speaker name must not be empty",
            ));
        }
        let replaced = self.guarded("designate_next_speaker", |ledger| {
            ledger.designate_next_speaker(name)
        })?;
        debug!(next_speaker = name, "Next speaker designated");
        Ok(match replaced {
            Some(previous) if previous != name => Ack::with_detail(format!(
                "next speaker set to {name} (replaced pending {previous})"
            )),
            _ => Ack::with_detail(format!("next speaker set to {name}")),
        })
    }

    /// Take the pending designation, if any. Failures read as "no designation".
    ///
    /// Only the scheduler consumes designations; workers see this handle too.
    pub(crate) fn consume_next_speaker(&self) -> Option<String> {
        self.guarded("consume_next_speaker", |ledger| ledger.consume_next_speaker())
            .unwrap_or_default()
    }

    /// Record a worker failure
    pub fn log_error(&self, worker_name: &str, message: &str) -> GatewayResult<Ack> {
        self.guarded("log_error", |ledger| ledger.log_error(worker_name, message))?;
        Ok(Ack::ok())
    }

    /// Whether a final conclusion has been set
    pub fn has_conclusion(&self) -> bool {
        self.guarded("has_conclusion", |ledger| Ok(ledger.has_conclusion()))
            .unwrap_or(false)
    }

    /// Snapshot of the ledger. Never fails; see [`LedgerSnapshot::Unavailable`].
    pub fn get_snapshot(&self, view: SnapshotView) -> LedgerSnapshot {
        match self.guarded("get_snapshot", |ledger| ledger.snapshot(view)) {
            Ok(snapshot) => snapshot,
            Err(e) => LedgerSnapshot::unavailable(e.message),
        }
    }

    /// Run a read-only closure against the store, for inspection and tests
    pub fn inspect<T>(&self, read: impl FnOnce(&S) -> T) -> T {
        let guard = self.lock();
        read(&guard)
    }
}

/// Strip whitespace and stray quoting from identifier-like worker input
fn clean_token(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
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
    use crate::ledger::{LedgerError, LedgerResult, LogicType};

    /// Store whose every operation fails or panics, for boundary tests
    struct BrokenStore {
        panic_instead: bool,
    }

    impl BrokenStore {
        fn fail<T>(&self, what: &str) -> LedgerResult<T> {
            if self.panic_instead {
                panic!("store exploded during {what}");
            }
            Err(LedgerError::internal(format!("disk gone during {what}")))
        }
    }

    impl LedgerStore for BrokenStore {
        fn raw_text(&self) -> &str {
            ""
        }
        fn add_task(&mut self, _: &str) -> LedgerResult<String> {
            self.fail("add_task")
        }
        fn add_argument(&mut self, _: &str) -> LedgerResult<String> {
            self.fail("add_argument")
        }
        fn add_fallacy(&mut self, _: &str, _: &str, _: Option<&str>) -> LedgerResult<String> {
            self.fail("add_fallacy")
        }
        fn add_belief_set(&mut self, _: &str, _: &str) -> LedgerResult<String> {
            self.fail("add_belief_set")
        }
        fn log_query(&mut self, _: &str, _: &str, _: &str) -> LedgerResult<String> {
            self.fail("log_query")
        }
        fn add_answer(
            &mut self,
            _: &str,
            _: &str,
            _: &str,
            _: &[String],
        ) -> LedgerResult<AnswerOutcome> {
            self.fail("add_answer")
        }
        fn set_conclusion(&mut self, _: &str) -> LedgerResult<ConclusionOutcome> {
            self.fail("set_conclusion")
        }
        fn designate_next_speaker(&mut self, _: &str) -> LedgerResult<Option<String>> {
            self.fail("designate_next_speaker")
        }
        fn consume_next_speaker(&mut self) -> LedgerResult<Option<String>> {
            self.fail("consume_next_speaker")
        }
        fn log_error(&mut self, _: &str, _: &str) -> LedgerResult<()> {
            self.fail("log_error")
        }
        fn has_conclusion(&self) -> bool {
            false
        }
        fn snapshot(&self, _: SnapshotView) -> LedgerResult<LedgerSnapshot> {
            self.fail("snapshot")
        }
    }

    fn assert_internal<T: std::fmt::Debug>(result: GatewayResult<T>) {
        let err = result.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Internal);
        assert!(err.to_string().starts_with("FUNC_ERROR[internal]"));
        assert!(!err.message.contains("disk gone"));
        assert!(!err.message.contains("exploded"));
    }

    fn exercise_all(gateway: &LedgerGateway<BrokenStore>) {
        assert_internal(gateway.add_task("t"));
        assert_internal(gateway.add_argument("a"));
        assert_internal(gateway.add_fallacy("ad_hominem", "j", Some("arg_1")));
        assert_internal(gateway.add_belief_set("pl", "a"));
        assert_internal(gateway.log_query("bs_1", "a", "ACCEPTED"));
        assert_internal(gateway.add_answer("task_1", "W1", "done", &[]));
        assert_internal(gateway.set_conclusion("Done"));
        assert_internal(gateway.designate_next_speaker("LogicWorker"));
        assert_internal(gateway.log_error("W1", "boom"));
        assert_eq!(gateway.consume_next_speaker(), None);

        let snapshot = gateway.get_snapshot(SnapshotView::Full);
        assert!(!snapshot.is_available());
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json_text()).unwrap();
        assert!(value["error"].as_str().unwrap().contains("get_snapshot"));
    }

    #[test]
    fn test_store_errors_become_tagged_results() {
        let gateway = LedgerGateway::new(BrokenStore {
            panic_instead: false,
        });
        exercise_all(&gateway);
    }

    #[test]
    fn test_store_panics_never_propagate() {
        let gateway = LedgerGateway::new(BrokenStore {
            panic_instead: true,
        });
        exercise_all(&gateway);
        // Lock must still be usable after repeated panics
        exercise_all(&gateway);
    }

    #[test]
    fn test_unsupported_logic_type_is_validation() {
        let gateway = LedgerGateway::open("T");
        let err = gateway.add_belief_set("modal", "[]p").unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Validation);
        assert!(err.to_string().starts_with("FUNC_ERROR[validation]"));
        assert!(err.message.contains("modal"));
        assert_eq!(gateway.inspect(|l| l.belief_sets().len()), 0);
    }

    #[test]
    fn test_logic_type_quoting_is_cleaned() {
        let gateway = LedgerGateway::open("T");
        let id = gateway.add_belief_set("  \"Propositional\" ", "a => b").unwrap();
        let stored = gateway.inspect(|l| l.belief_sets().get(&id).map(|b| b.logic_type));
        assert_eq!(stored, Some(LogicType::Propositional));
    }

    #[test]
    fn test_consume_next_speaker_single_shot() {
        let gateway = LedgerGateway::open("T");
        gateway.designate_next_speaker("LogicWorker").unwrap();
        assert_eq!(gateway.consume_next_speaker(), Some("LogicWorker".to_string()));
        assert_eq!(gateway.consume_next_speaker(), None);
    }

    #[test]
    fn test_empty_designation_rejected() {
        let gateway = LedgerGateway::open("T");
        let err = gateway.designate_next_speaker("  ").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(gateway.consume_next_speaker(), None);
    }

    #[test]
    fn test_designation_replacement_reported() {
        let gateway = LedgerGateway::open("T");
        gateway.designate_next_speaker("LogicWorker").unwrap();
        let ack = gateway.designate_next_speaker("ExtractWorker").unwrap();
        assert!(ack.to_string().contains("replaced pending LogicWorker"));
    }

    #[test]
    fn test_answer_overwrite_reported_in_ack() {
        let gateway = LedgerGateway::open("T");
        let task = gateway.add_task("Identify arguments").unwrap();
        gateway.add_answer(&task, "W1", "draft", &[]).unwrap();
        let ack = gateway.add_answer(&task, "W2", "final", &[]).unwrap();
        assert!(ack.to_string().contains("replaced the previous answer by W1"));
    }

    #[test]
    fn test_clones_share_one_ledger() {
        let gateway = LedgerGateway::open("T");
        let other = gateway.clone();
        other.add_task("a").unwrap();
        assert_eq!(gateway.add_task("b").unwrap(), "task_2");
    }

    #[test]
    fn test_end_to_end_full_snapshot() {
        let gateway = LedgerGateway::open("T");
        assert_eq!(gateway.add_task("Identify arguments").unwrap(), "task_1");
        assert_eq!(gateway.add_argument("X").unwrap(), "arg_1");
        assert_eq!(
            gateway.add_fallacy("ad_hominem", "Y", Some("arg_1")).unwrap(),
            "fallacy_1"
        );
        gateway
            .add_answer("task_1", "W1", "done", &["fallacy_1".to_string()])
            .unwrap();
        gateway.set_conclusion("Done").unwrap();
        assert!(gateway.has_conclusion());

        let snapshot = gateway.get_snapshot(SnapshotView::Full);
        let full = snapshot.as_full().unwrap();
        assert_eq!(full.raw_text, "T");
        assert_eq!(
            full.analysis_tasks.get("task_1").map(String::as_str),
            Some("Identify arguments")
        );
        assert_eq!(full.identified_arguments.get("arg_1").map(String::as_str), Some("X"));
        let fallacy = full.identified_fallacies.get("fallacy_1").unwrap();
        assert_eq!(fallacy.fallacy_type, "ad_hominem");
        assert_eq!(fallacy.target_argument_id.as_deref(), Some("arg_1"));
        let answer = full.answers.get("task_1").unwrap();
        assert_eq!(answer.author, "W1");
        assert_eq!(answer.source_ids, vec!["fallacy_1"]);
        assert_eq!(full.final_conclusion.as_deref(), Some("Done"));

        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json_text()).unwrap();
        assert_eq!(value["final_conclusion"], "Done");
        assert_eq!(value["identified_fallacies"]["fallacy_1"]["type"], "ad_hominem");
        assert_eq!(value["answers"]["task_1"]["text"], "done");
    }
}
