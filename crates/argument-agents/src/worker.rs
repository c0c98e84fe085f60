//! Worker seam: one named participant in the conversation.
//!
//! A worker gets a [`TurnContext`] (history so far, a ledger snapshot, and
//! the ledger gateway) and produces exactly one message. Any ledger changes
//! it makes during the turn go through the gateway it was handed.

use argument_coordination::{ConversationHistory, LedgerGateway, LedgerSnapshot, MessageRole};
use async_trait::async_trait;

use crate::errors::WorkerError;

/// Everything a worker sees for one turn.
///
/// Owned data only, so a turn can run on its own task.
#[derive(Clone)]
pub struct TurnContext {
    /// 1-based turn number
    pub turn: u64,
    pub history: ConversationHistory,
    pub snapshot: LedgerSnapshot,
    pub ledger: LedgerGateway,
}

/// The single message a worker contributes per turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerMessage {
    pub content: String,
    pub role: MessageRole,
}

impl WorkerMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: MessageRole::Assistant,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Worker: Send + Sync {
    /// Name the scheduler and designations refer to
    fn name(&self) -> String;

    async fn take_turn(&self, ctx: &TurnContext) -> Result<WorkerMessage, WorkerError>;
}
