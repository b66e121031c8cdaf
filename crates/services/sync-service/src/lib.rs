//! Sync Service Library
//!
//! Orchestrates password changes across the configured identity backends:
//! validation, per-user locking, ordered forward changes and compensating
//! rollback.

pub mod lock;
pub mod saga;
pub mod service;

use std::sync::Arc;

use tracing::info;

use common::{CredentialBackend, SyncConfig, SyncResult};
use directory_client::DirectoryClient;
use domain::SystemKind;
use dsm_client::DsmClient;

pub use service::{CredentialSync, SyncService};

#[cfg(any(test, feature = "test-utils"))]
pub use service::MockSyncService;

/// Build the orchestrator and its backend clients from configuration.
///
/// Only the systems named in `config.order` get a client, in that order.
pub fn build_from_config(config: SyncConfig) -> SyncResult<CredentialSync> {
    config.validate()?;

    let mut backends: Vec<Arc<dyn CredentialBackend>> = Vec::with_capacity(config.order.len());
    for system in &config.order {
        let backend: Arc<dyn CredentialBackend> = match system {
            SystemKind::Dsm => Arc::new(DsmClient::new(config.dsm.clone())?),
            SystemKind::Directory => Arc::new(DirectoryClient::new(config.directory.clone())?),
        };
        backends.push(backend);
    }

    info!(order = ?config.order, lock_timeout = ?config.lock_timeout, "Credential sync configured");
    CredentialSync::new(backends, config.policy.policy(), config.lock_timeout)
}
