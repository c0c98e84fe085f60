//! Async runtime for argument-analysis sessions.
//!
//! Wraps the deterministic core from `argument_coordination` in a turn loop
//! that invokes workers, isolates their failures, and reports what happened.
//!
//! - [`worker`]: the `Worker` trait each participant implements
//! - [`session`]: `ConversationLoop` and `SessionOutcome`
//! - [`config`]: `SessionConfig` with TOML and environment layering
//! - [`events`]: broadcast bus of session lifecycle events
//! - [`telemetry`]: tracing setup and per-turn JSONL telemetry
//! - [`errors`]: worker and session error types

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod errors;
pub mod events;
pub mod session;
pub mod telemetry;
pub mod worker;

pub use config::SessionConfig;
pub use errors::{SessionError, WorkerError};
pub use events::{EventBus, SessionEnd, SessionEvent, SharedEventBus};
pub use session::{ConversationLoop, SessionOutcome};
pub use telemetry::{append_telemetry, init_tracing, SessionTelemetry, TurnOutcome, TurnRecord};
pub use worker::{TurnContext, Worker, WorkerMessage};
