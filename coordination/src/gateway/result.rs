//! Tagged results returned across the gateway boundary.

use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Tag carried by every gateway error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    /// The caller sent something the ledger rejects; retrying with different input can succeed
    Validation,
    /// Something broke inside the ledger; details are only in the logs
    Internal,
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Error handed back to a worker instead of a raised failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("FUNC_ERROR[{kind}]: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    /// Gateway operation that failed
    pub operation: String,
    pub message: String,
}

impl GatewayError {
    pub fn validation(operation: &str, message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Validation,
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Generic internal error. The underlying detail goes to the logs only.
    pub fn internal(operation: &str) -> Self {
        Self {
            kind: GatewayErrorKind::Internal,
            operation: operation.to_string(),
            message: format!("{operation} failed due to an internal ledger error"),
        }
    }

    /// Convert a store error raised during `operation`
    pub fn from_ledger(operation: &str, err: &LedgerError) -> Self {
        if err.is_validation() {
            Self::validation(operation, err.to_string())
        } else {
            Self::internal(operation)
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind == GatewayErrorKind::Validation
    }
}

/// Success marker for calls with no natural return value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
        }
    }
}

impl std::fmt::Display for Ack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "OK: {}", detail),
            None => write!(f, "OK"),
        }
    }
}

/// Plain-text rendering for a text-generating caller.
///
/// Only the outermost boundary (tool dispatch) should need this; everything
/// inside the crate works with the typed results.
pub trait RenderForWorker {
    fn render(&self) -> String;
}

impl RenderForWorker for GatewayResult<String> {
    fn render(&self) -> String {
        match self {
            Ok(value) => value.clone(),
            Err(e) => e.to_string(),
        }
    }
}

impl RenderForWorker for GatewayResult<Ack> {
    fn render(&self) -> String {
        match self {
            Ok(ack) => ack.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_display() {
        assert_eq!(Ack::ok().to_string(), "OK");
        assert_eq!(Ack::with_detail("replaced").to_string(), "OK: replaced");
    }

    #[test]
    fn test_error_tagging() {
        let err = GatewayError::validation("add_belief_set", "unsupported logic type 'modal'");
        assert_eq!(
            err.to_string(),
            "FUNC_ERROR[validation]: unsupported logic type 'modal'"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let ledger_err = LedgerError::internal("secret index corruption");
        let err = GatewayError::from_ledger("add_task", &ledger_err);
        assert_eq!(err.kind, GatewayErrorKind::Internal);
        assert!(!err.to_string().contains("secret"));
        assert!(err.to_string().starts_with("FUNC_ERROR[internal]"));
    }

    #[test]
    fn test_render_results() {
        let ok: GatewayResult<String> = Ok("task_1".to_string());
        assert_eq!(ok.render(), "task_1");
        let failed: GatewayResult<Ack> = Err(GatewayError::internal("set_conclusion"));
        assert!(failed.render().starts_with("FUNC_ERROR[internal]"));
    }
}
