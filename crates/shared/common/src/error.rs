//! Unified error taxonomy for credential sync.
//!
//! Backend clients map their transport and protocol errors into this fixed
//! set before anything reaches the orchestrator, so no raw `reqwest` or
//! `ldap3` error ever crosses a crate boundary.

use domain::DomainError;
use thiserror::Error;

/// Sync error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    // Request errors
    #[error("{0}")]
    Validation(String),

    #[error("Access denied: {0}")]
    Permission(String),

    // Backend errors
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    // Orchestration errors
    #[error("Another change for {0} is in progress")]
    Concurrency(String),

    #[error("Rollback failed: {0}")]
    RollbackFailed(String),

    // Internal
    #[error("Internal error")]
    Internal(String),
}

impl SyncError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "VALIDATION_ERROR",
            SyncError::Permission(_) => "PERMISSION_ERROR",
            SyncError::Auth(_) => "AUTH_ERROR",
            SyncError::NotFound(_) => "NOT_FOUND",
            SyncError::Connection(_) => "CONNECTION_ERROR",
            SyncError::Concurrency(_) => "CONCURRENCY_ERROR",
            SyncError::RollbackFailed(_) => "ROLLBACK_FAILED",
            SyncError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            SyncError::RollbackFailed(msg) => {
                format!("Systems are out of sync and need manual reconciliation: {}", msg)
            }
            _ => self.to_string(),
        }
    }

    /// Whether the request was refused before any backend was contacted.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::Validation(_) | SyncError::Permission(_) | SyncError::Concurrency(_)
        )
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => SyncError::Validation(msg),
            DomainError::Password(msg) => SyncError::Validation(msg),
            DomainError::Forbidden(msg) => SyncError::Permission(msg),
            DomainError::NotFound(msg) => SyncError::Validation(format!("Unknown {}", msg)),
        }
    }
}

/// Result type alias
pub type SyncResult<T> = Result<T, SyncError>;

/// Convenience constructors
impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        SyncError::Permission(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        SyncError::Auth(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        SyncError::NotFound(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        SyncError::Connection(msg.into())
    }

    pub fn concurrency(target: impl Into<String>) -> Self {
        SyncError::Concurrency(target.into())
    }

    pub fn rollback_failed(msg: impl Into<String>) -> Self {
        SyncError::RollbackFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SyncError::Internal(msg.into())
    }
}
