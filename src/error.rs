//! Error types for the Bibliotek client core

use thiserror::Error;
use uuid::Uuid;

/// Main client-core error type.
///
/// `Transient` is the only variant the core will retry (once); `Validation`
/// and `ConflictingMutation` are rejected before any network call when raised
/// client-side. Stale push events are not errors: they are dropped silently
/// and logged at debug level by the store.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A mutation is already in flight for this record; the action must stay
    /// disabled until the pending one resolves.
    #[error("a mutation is already pending for loan {0}")]
    ConflictingMutation(Uuid),

    #[error("no such loan: {0}")]
    UnknownLoan(Uuid),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("push subscription error: {0}")]
    Push(String),
}

impl CoreError {
    /// Whether the caller may retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

/// Result type alias for client-core operations
pub type CoreResult<T> = Result<T, CoreError>;
