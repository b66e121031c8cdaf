//! Capability interface shared by every identity backend.
//!
//! The orchestrator drives backends only through this trait, so adding a
//! third backend never touches orchestration logic.

use async_trait::async_trait;
use domain::{Secret, SystemKind};

use crate::error::SyncResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Backend trait for dependency injection.
///
/// Implementations own their transient session/bind state for the duration
/// of a single call and never retry internally.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Which system this backend talks to
    fn system(&self) -> SystemKind;

    /// Read-only connectivity probe, safe to run at any time
    async fn test_connection(&self) -> SyncResult<()>;

    /// Replace the password of `username` with `new_password`
    async fn set_password(&self, username: &str, new_password: &Secret) -> SyncResult<()>;
}
