//! Service layer - orchestration use cases.

mod credential_sync;

pub use credential_sync::CredentialSync;

use async_trait::async_trait;

use common::SyncResult;
use domain::{ChangeRequest, ChangeResult, ConnectivityReport};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Sync service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait SyncService: Send + Sync {
    /// Probe every registered backend.
    async fn connectivity(&self) -> ConnectivityReport;

    /// Change a password across the requested backends.
    ///
    /// Rejections (permission, validation, concurrency) come back as
    /// `Err`; anything that reached a backend comes back as a
    /// [`ChangeResult`].
    async fn change_password(&self, request: ChangeRequest) -> SyncResult<ChangeResult>;
}
