//! Argument Analysis Coordination Library
//!
//! Deterministic core for sessions in which several text-generating workers
//! take turns analyzing a passage for argument structure, logical validity
//! and rhetorical fallacies.
//!
//! # Modules
//!
//! - [`ledger`]: the shared session record (tasks, arguments, fallacies,
//!   belief sets, queries, answers, errors, conclusion, next-speaker slot)
//! - [`gateway`]: the only mutation/query surface handed to workers; turns
//!   every outcome into a tagged result and exposes a tool catalog
//! - [`conversation`]: append-only conversation history
//! - [`scheduler`]: next-speaker selection balancing hand-offs and fairness
//! - [`termination`]: conclusion / step-ceiling stop predicate
//!
//! Nothing here is async. The runtime loop lives in `argument-agents`.

#![allow(clippy::uninlined_format_args)]

pub mod conversation;
pub mod gateway;
pub mod ledger;
pub mod scheduler;
pub mod termination;

pub use conversation::{ChatMessage, ConversationHistory, MessageRole};
pub use gateway::{
    dispatch, tool_definitions, Ack, GatewayError, GatewayErrorKind, GatewayResult, GatewayTool,
    LedgerGateway, RenderForWorker, ToolDefinition,
};
pub use ledger::{
    Ledger, LedgerError, LedgerSnapshot, LedgerStore, LogicType, SnapshotView,
};
pub use scheduler::{ParticipationScheduler, SchedulerError, Selection, SelectionReason};
pub use termination::{StopReason, TerminationPolicy, DEFAULT_MAX_STEPS};
