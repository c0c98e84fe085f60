//! The in-memory ledger and the store trait the gateway drives.

use chrono::Utc;
use tracing::{debug, warn};

use super::error::{LedgerError, LedgerResult};
use super::snapshot::{FullSnapshot, LedgerSnapshot, SnapshotView, SummarySnapshot};
use super::types::{
    Answer, AnswerOutcome, BeliefSet, ConclusionOutcome, EntityKind, ErrorRecord, Fallacy,
    IdSequence, LogicType, OrderedMap, QueryRecord, Registry,
};

/// Mutation and query surface of a session ledger.
///
/// Every method is a single structural update or read. [`Ledger`] is the
/// production implementation; the trait exists so the gateway can be driven
/// against other stores.
pub trait LedgerStore: Send {
    /// The text under analysis
    fn raw_text(&self) -> &str;

    fn add_task(&mut self, description: &str) -> LedgerResult<String>;

    fn add_argument(&mut self, description: &str) -> LedgerResult<String>;

    fn add_fallacy(
        &mut self,
        fallacy_type: &str,
        justification: &str,
        target_argument_id: Option<&str>,
    ) -> LedgerResult<String>;

    /// Store a belief set. Fails with `UnsupportedLogicType` and leaves the
    /// ledger untouched when `logic_type` is not recognized.
    fn add_belief_set(&mut self, logic_type: &str, content: &str) -> LedgerResult<String>;

    fn log_query(
        &mut self,
        belief_set_id: &str,
        query: &str,
        raw_result: &str,
    ) -> LedgerResult<String>;

    fn add_answer(
        &mut self,
        task_id: &str,
        author: &str,
        text: &str,
        source_ids: &[String],
    ) -> LedgerResult<AnswerOutcome>;

    fn set_conclusion(&mut self, text: &str) -> LedgerResult<ConclusionOutcome>;

    /// Put `name` in the next-speaker slot, returning whatever it replaced
    fn designate_next_speaker(&mut self, name: &str) -> LedgerResult<Option<String>>;

    /// Take the pending designation, leaving the slot empty
    fn consume_next_speaker(&mut self) -> LedgerResult<Option<String>>;

    fn log_error(&mut self, worker_name: &str, message: &str) -> LedgerResult<()>;

    fn has_conclusion(&self) -> bool;

    fn snapshot(&self, view: SnapshotView) -> LedgerResult<LedgerSnapshot>;
}

/// Canonical record of one analysis session.
#[derive(Debug, Clone)]
pub struct Ledger {
    raw_text: String,
    analysis_tasks: Registry<String>,
    identified_arguments: Registry<String>,
    identified_fallacies: Registry<Fallacy>,
    belief_sets: Registry<BeliefSet>,
    query_sequence: IdSequence,
    query_log: Vec<QueryRecord>,
    answers: OrderedMap<Answer>,
    errors: Vec<ErrorRecord>,
    final_conclusion: Option<String>,
    next_speaker: Option<String>,
}

impl Ledger {
    /// Create a ledger for `raw_text`. The text never changes afterwards.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            analysis_tasks: Registry::new(EntityKind::Task),
            identified_arguments: Registry::new(EntityKind::Argument),
            identified_fallacies: Registry::new(EntityKind::Fallacy),
            belief_sets: Registry::new(EntityKind::BeliefSet),
            query_sequence: IdSequence::new(EntityKind::Query),
            query_log: Vec::new(),
            answers: OrderedMap::new(),
            errors: Vec::new(),
            final_conclusion: None,
            next_speaker: None,
        }
    }

    pub fn analysis_tasks(&self) -> &Registry<String> {
        &self.analysis_tasks
    }

    pub fn identified_arguments(&self) -> &Registry<String> {
        &self.identified_arguments
    }

    pub fn identified_fallacies(&self) -> &Registry<Fallacy> {
        &self.identified_fallacies
    }

    pub fn belief_sets(&self) -> &Registry<BeliefSet> {
        &self.belief_sets
    }

    pub fn query_log(&self) -> &[QueryRecord] {
        &self.query_log
    }

    pub fn answers(&self) -> &OrderedMap<Answer> {
        &self.answers
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn final_conclusion(&self) -> Option<&str> {
        self.final_conclusion.as_deref()
    }

    pub fn pending_next_speaker(&self) -> Option<&str> {
        self.next_speaker.as_deref()
    }

    fn summary(&self) -> SummarySnapshot {
        SummarySnapshot {
            raw_text: self.raw_text.clone(),
            task_count: self.analysis_tasks.len(),
            argument_count: self.identified_arguments.len(),
            fallacy_count: self.identified_fallacies.len(),
            belief_set_count: self.belief_sets.len(),
            query_count: self.query_log.len(),
            answer_count: self.answers.len(),
            error_count: self.errors.len(),
            task_ids: self.analysis_tasks.ids().map(str::to_string).collect(),
            argument_ids: self.identified_arguments.ids().map(str::to_string).collect(),
            fallacy_ids: self.identified_fallacies.ids().map(str::to_string).collect(),
            answered_task_ids: self.answers.keys().map(str::to_string).collect(),
            final_conclusion: self.final_conclusion.clone(),
            next_speaker_pending: self.next_speaker.is_some(),
        }
    }

    fn full(&self) -> FullSnapshot {
        FullSnapshot {
            raw_text: self.raw_text.clone(),
            analysis_tasks: self.analysis_tasks.clone(),
            identified_arguments: self.identified_arguments.clone(),
            identified_fallacies: self.identified_fallacies.clone(),
            belief_sets: self.belief_sets.clone(),
            query_log: self.query_log.clone(),
            answers: self.answers.clone(),
            errors: self.errors.clone(),
            final_conclusion: self.final_conclusion.clone(),
            next_speaker: self.next_speaker.clone(),
        }
    }
}

impl LedgerStore for Ledger {
    fn raw_text(&self) -> &str {
        &self.raw_text
    }

    fn add_task(&mut self, description: &str) -> LedgerResult<String> {
        let id = self.analysis_tasks.insert(description.to_string());
        debug!(task_id = %id, "Task added");
        Ok(id)
    }

    fn add_argument(&mut self, description: &str) -> LedgerResult<String> {
        let id = self.identified_arguments.insert(description.to_string());
        debug!(argument_id = %id, "Argument added");
        Ok(id)
    }

    fn add_fallacy(
        &mut self,
        fallacy_type: &str,
        justification: &str,
        target_argument_id: Option<&str>,
    ) -> LedgerResult<String> {
        if let Some(target) = target_argument_id {
            if !self.identified_arguments.contains(target) {
                warn!(target_argument_id = target, "Fallacy targets an unknown argument");
            }
        }
        let id = self.identified_fallacies.insert(Fallacy {
            fallacy_type: fallacy_type.to_string(),
            justification: justification.to_string(),
            target_argument_id: target_argument_id.map(str::to_string),
        });
        debug!(fallacy_id = %id, fallacy_type, "Fallacy added");
        Ok(id)
    }

    fn add_belief_set(&mut self, logic_type: &str, content: &str) -> LedgerResult<String> {
        let logic_type = LogicType::parse(logic_type)
            .ok_or_else(|| LedgerError::unsupported_logic_type(logic_type))?;
        let id = self.belief_sets.insert(BeliefSet {
            logic_type,
            content: content.to_string(),
        });
        debug!(belief_set_id = %id, %logic_type, "Belief set added");
        Ok(id)
    }

    fn log_query(
        &mut self,
        belief_set_id: &str,
        query: &str,
        raw_result: &str,
    ) -> LedgerResult<String> {
        if !self.belief_sets.contains(belief_set_id) {
            warn!(belief_set_id, "Query logged against an unknown belief set");
        }
        let id = self.query_sequence.next_id();
        self.query_log.push(QueryRecord {
            id: id.clone(),
            belief_set_id: belief_set_id.to_string(),
            query: query.to_string(),
            raw_result: raw_result.to_string(),
            logged_at: Utc::now(),
        });
        debug!(query_id = %id, belief_set_id, "Query logged");
        Ok(id)
    }

    fn add_answer(
        &mut self,
        task_id: &str,
        author: &str,
        text: &str,
        source_ids: &[String],
    ) -> LedgerResult<AnswerOutcome> {
        if !self.analysis_tasks.contains(task_id) {
            warn!(task_id, "Answer submitted for an unknown task");
        }
        let previous = self.answers.upsert(
            task_id.to_string(),
            Answer {
                author: author.to_string(),
                text: text.to_string(),
                source_ids: source_ids.to_vec(),
                answered_at: Utc::now(),
            },
        );
        match previous {
            Some(old) => {
                warn!(task_id, previous_author = %old.author, author, "Answer overwritten");
                Ok(AnswerOutcome::Replaced {
                    previous_author: old.author,
                })
            }
            None => {
                debug!(task_id, author, "Answer recorded");
                Ok(AnswerOutcome::Recorded)
            }
        }
    }

    fn set_conclusion(&mut self, text: &str) -> LedgerResult<ConclusionOutcome> {
        match self.final_conclusion.replace(text.to_string()) {
            Some(previous) => {
                warn!("Final conclusion set more than once; keeping the latest");
                Ok(ConclusionOutcome::Replaced { previous })
            }
            None => Ok(ConclusionOutcome::Set),
        }
    }

    fn designate_next_speaker(&mut self, name: &str) -> LedgerResult<Option<String>> {
        Ok(self.next_speaker.replace(name.to_string()))
    }

    fn consume_next_speaker(&mut self) -> LedgerResult<Option<String>> {
        Ok(self.next_speaker.take())
    }

    fn log_error(&mut self, worker_name: &str, message: &str) -> LedgerResult<()> {
        self.errors.push(ErrorRecord {
            worker_name: worker_name.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn has_conclusion(&self) -> bool {
        self.final_conclusion.is_some()
    }

    fn snapshot(&self, view: SnapshotView) -> LedgerResult<LedgerSnapshot> {
        Ok(match view {
            SnapshotView::Summary => LedgerSnapshot::Summary(self.summary()),
            SnapshotView::Full => LedgerSnapshot::Full(Box::new(self.full())),
        })
    }
}
