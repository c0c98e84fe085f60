//! Error taxonomy for the session runtime.
//!
//! | Error                              | Effect on the session                  |
//! |------------------------------------|----------------------------------------|
//! | `WorkerError::TransportTerminated` | loop ends gracefully                   |
//! | any other `WorkerError`            | logged to the ledger, next turn runs   |
//! | `SessionError`                     | construction fails, no session starts  |

use argument_coordination::SchedulerError;
use thiserror::Error;

/// A worker failed to produce a usable turn.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Worker answered, but the answer cannot be used.
    #[error("unusable response from {worker}: {reason}")]
    Unusable { worker: String, reason: String },

    /// Inference backend failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The conversation transport reports it has already finished.
    #[error("conversation transport already finished: {0}")]
    TransportTerminated(String),

    /// Worker task panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WorkerError {
    pub fn is_transport_terminated(&self) -> bool {
        matches!(self, Self::TransportTerminated(_))
    }
}

/// Misconfiguration detected before the first turn.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session configuration: {0}")]
    Configuration(String),

    #[error("worker '{0}' is configured but no implementation was supplied")]
    MissingWorker(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
