//! Domain-level errors.
//!
//! Raised while checking a change request, before any backend is
//! contacted.

use thiserror::Error;

/// Reasons a change request is refused by the domain rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or inconsistent request
    #[error("Invalid request: {0}")]
    Validation(String),

    /// New password refused by the policy
    #[error("Password rejected: {0}")]
    Password(String),

    /// Requester may not act on the target account
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown system name
    #[error("Unknown {0}")]
    NotFound(String),
}

impl DomainError {
    pub fn validation(reason: impl Into<String>) -> Self {
        DomainError::Validation(reason.into())
    }

    pub fn password(reason: impl Into<String>) -> Self {
        DomainError::Password(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        DomainError::Forbidden(reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
