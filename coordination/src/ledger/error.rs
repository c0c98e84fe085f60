//! Ledger error types

use thiserror::Error;

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors raised by a ledger store.
///
/// `UnsupportedLogicType` is the only failure a well-formed call can hit on
/// the in-memory [`Ledger`](super::Ledger). `Internal` exists for stores that
/// can break in ways the caller cannot fix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Belief set submitted with a logic type the ledger does not know
    #[error("unsupported logic type '{given}' (supported: {supported})")]
    UnsupportedLogicType { given: String, supported: String },

    /// Unexpected failure inside the store
    #[error("internal ledger failure: {message}")]
    Internal { message: String },
}

impl LedgerError {
    /// Create an unsupported logic type error listing every accepted spelling
    pub fn unsupported_logic_type(given: impl Into<String>) -> Self {
        Self::UnsupportedLogicType {
            given: given.into(),
            supported: super::LogicType::accepted_spellings().join(", "),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller can fix this by changing its input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnsupportedLogicType { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_logic_type_lists_spellings() {
        let err = LedgerError::unsupported_logic_type("modal");
        let text = err.to_string();
        assert!(text.contains("'modal'"));
        assert!(text.contains("propositional"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_internal_is_not_validation() {
        let err = LedgerError::internal("index out of sync");
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "internal ledger failure: index out of sync");
    }
}
