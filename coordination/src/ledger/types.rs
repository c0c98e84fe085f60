//! Ledger record types and the ordered id registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Formal logic a belief set is written in.
///
/// Parsing is case-insensitive and treats `-`, spaces and `_` alike, so
/// `"Propositional"`, `"PROPOSITIONAL-LOGIC"` and `"pl"` all collapse to
/// [`LogicType::Propositional`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicType {
    Propositional,
}

impl LogicType {
    /// Every logic type the ledger stores
    pub fn all() -> &'static [LogicType] {
        &[LogicType::Propositional]
    }

    /// Canonical stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propositional => "propositional",
        }
    }

    /// Spellings accepted by [`LogicType::parse`] after normalization
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Propositional => &["propositional", "propositional_logic", "pl"],
        }
    }

    /// All accepted spellings across every logic type
    pub fn accepted_spellings() -> Vec<&'static str> {
        Self::all()
            .iter()
            .flat_map(|logic| logic.aliases().iter().copied())
            .collect()
    }

    /// Resolve a free-form logic type name to its canonical variant.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        Self::all()
            .iter()
            .copied()
            .find(|logic| logic.aliases().contains(&normalized.as_str()))
    }
}

impl std::fmt::Display for LogicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of ledger entity that receives a generated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Argument,
    Fallacy,
    BeliefSet,
    Query,
}

impl EntityKind {
    /// Id prefix, e.g. `task` in `task_3`
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Argument => "arg",
            Self::Fallacy => "fallacy",
            Self::BeliefSet => "bs",
            Self::Query => "query",
        }
    }

    /// Format the id for sequence number `seq`
    pub fn format_id(&self, seq: u64) -> String {
        format!("{}_{}", self.prefix(), seq)
    }
}

/// Monotonic id generator for one entity kind. Ids start at 1 and are never reused.
#[derive(Debug, Clone)]
pub struct IdSequence {
    kind: EntityKind,
    issued: u64,
}

impl IdSequence {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind, issued: 0 }
    }

    /// Issue the next id
    pub fn next_id(&mut self) -> String {
        self.issued += 1;
        self.kind.format_id(self.issued)
    }

    /// Number of ids issued so far
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

/// Insertion-ordered string-keyed map.
///
/// Serializes as a JSON object whose keys appear in insertion order.
#[derive(Debug, Clone)]
pub struct OrderedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value under `key`, returning the previous value.
    ///
    /// A replaced entry keeps its original position.
    pub fn upsert(&mut self, key: String, value: T) -> Option<T> {
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut self.entries[pos].1, value));
        }
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

/// Id-issuing collection: every insert gets the next id of its kind.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    sequence: IdSequence,
    entries: OrderedMap<T>,
}

impl<T> Registry<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            sequence: IdSequence::new(kind),
            entries: OrderedMap::new(),
        }
    }

    /// Store `value` under a freshly issued id and return the id
    pub fn insert(&mut self, value: T) -> String {
        let id = self.sequence.next_id();
        // Issued ids are never reused, so there is nothing to replace
        self.entries.entries.push((id.clone(), value));
        id
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter()
    }
}

impl<T: Serialize> Serialize for Registry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// A fallacy identified in the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fallacy {
    /// Fallacy name, e.g. `ad_hominem`
    #[serde(rename = "type")]
    pub fallacy_type: String,
    pub justification: String,
    /// Argument the fallacy applies to (not checked against existing arguments)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_argument_id: Option<String>,
}

/// A formalized set of beliefs in some logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeliefSet {
    pub logic_type: LogicType,
    pub content: String,
}

/// One query run against a belief set.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub id: String,
    pub belief_set_id: String,
    pub query: String,
    pub raw_result: String,
    pub logged_at: DateTime<Utc>,
}

/// A worker's answer to an analysis task.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub author: String,
    pub text: String,
    /// Ledger ids the answer draws on
    pub source_ids: Vec<String>,
    pub answered_at: DateTime<Utc>,
}

/// A worker failure recorded during the session.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub worker_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// What `add_answer` did with an existing answer for the same task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Recorded,
    /// A previous answer by `previous_author` was overwritten
    Replaced { previous_author: String },
}

/// What `set_conclusion` did with an existing conclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConclusionOutcome {
    Set,
    Replaced { previous: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_type_aliases_collapse() {
        for raw in [
            "propositional",
            "Propositional",
            "PROPOSITIONAL",
            "  propositional ",
            "PL",
            "pl",
            "Propositional Logic",
            "propositional-logic",
        ] {
            assert_eq!(
                LogicType::parse(raw),
                Some(LogicType::Propositional),
                "{raw:?} should parse"
            );
        }
    }

    #[test]
    fn test_logic_type_rejects_unknown() {
        assert_eq!(LogicType::parse("first_order"), None);
        assert_eq!(LogicType::parse("modal"), None);
        assert_eq!(LogicType::parse(""), None);
        assert_eq!(LogicType::parse("p l"), None);
    }

    #[test]
    fn test_logic_type_serializes_canonical() {
        let json = serde_json::to_string(&LogicType::Propositional).unwrap();
        assert_eq!(json, "\"propositional\"");
        assert_eq!(LogicType::Propositional.to_string(), "propositional");
    }

    #[test]
    fn test_id_sequence_is_monotonic() {
        let mut seq = IdSequence::new(EntityKind::Fallacy);
        assert_eq!(seq.next_id(), "fallacy_1");
        assert_eq!(seq.next_id(), "fallacy_2");
        assert_eq!(seq.issued(), 2);
    }

    #[test]
    fn test_registry_keeps_insertion_order_past_nine() {
        let mut reg = Registry::new(EntityKind::Task);
        for i in 0..12 {
            reg.insert(format!("task {i}"));
        }
        let ids: Vec<&str> = reg.ids().collect();
        assert_eq!(ids[0], "task_1");
        assert_eq!(ids[9], "task_10");
        assert_eq!(ids[11], "task_12");

        let json = serde_json::to_string(&reg).unwrap();
        let pos_2 = json.find("\"task_2\"").unwrap();
        let pos_10 = json.find("\"task_10\"").unwrap();
        assert!(pos_2 < pos_10, "serialized order must follow insertion");
    }

    #[test]
    fn test_registry_bulk_insert_keeps_every_entry() {
        let mut reg = Registry::new(EntityKind::Argument);
        for i in 1..=5_000 {
            assert_eq!(reg.insert(i), format!("arg_{i}"));
        }
        assert_eq!(reg.len(), 5_000);
        assert_eq!(reg.get("arg_1"), Some(&1));
        assert_eq!(reg.get("arg_5000"), Some(&5_000));
        assert!(!reg.contains("arg_5001"));
    }

    #[test]
    fn test_ordered_map_upsert_returns_previous() {
        let mut map = OrderedMap::new();
        assert_eq!(map.upsert("a".to_string(), 1), None);
        map.upsert("b".to_string(), 2);
        assert_eq!(map.upsert("a".to_string(), 3), Some(1));
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&3));
    }

    #[test]
    fn test_fallacy_serializes_type_field() {
        let fallacy = Fallacy {
            fallacy_type: "ad_hominem".to_string(),
            justification: "attacks the speaker".to_string(),
            target_argument_id: None,
        };
        let value = serde_json::to_value(&fallacy).unwrap();
        assert_eq!(value["type"], "ad_hominem");
        assert!(value.get("target_argument_id").is_none());
    }
}
