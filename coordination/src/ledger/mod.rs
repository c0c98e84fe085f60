//! Session ledger: the shared record of one analysis session
//!
//! Holds everything the workers produce: analysis tasks, identified
//! arguments and fallacies, belief sets and the queries run against them,
//! per-task answers, worker errors, the final conclusion, and a single-slot
//! next-speaker designation.
//!
//! # Ids
//!
//! Each entity kind has its own monotonically increasing id sequence
//! (`task_1`, `arg_1`, `fallacy_1`, `bs_1`, `query_1`). Ids are never reused,
//! and a rejected call never consumes one.
//!
//! Workers never touch a [`Ledger`] directly; every call goes through
//! [`LedgerGateway`](crate::gateway::LedgerGateway).

pub mod error;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::{LedgerError, LedgerResult};
pub use snapshot::{FullSnapshot, LedgerSnapshot, SnapshotFailure, SnapshotView, SummarySnapshot};
pub use store::{Ledger, LedgerStore};
pub use types::{
    Answer, AnswerOutcome, BeliefSet, ConclusionOutcome, EntityKind, ErrorRecord, Fallacy,
    IdSequence, LogicType, OrderedMap, QueryRecord, Registry,
};
