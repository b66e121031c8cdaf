//! Credential sync orchestrator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use common::{CredentialBackend, SyncError, SyncResult};
use domain::{
    ChangeRequest, ChangeResult, ConnectivityReport, ConnectivityStatus, PasswordPolicy,
    SystemKind,
};

use super::SyncService;
use crate::lock::KeyedLock;
use crate::saga::Saga;

struct Inner {
    backends: Vec<Arc<dyn CredentialBackend>>,
    policy: PasswordPolicy,
    lock_timeout: Duration,
    locks: KeyedLock,
}

/// Orchestrates password changes over the registered backends.
///
/// Backends are processed in the order they were registered. Cloning is
/// cheap and clones share the per-target locks.
#[derive(Clone)]
pub struct CredentialSync {
    inner: Arc<Inner>,
}

impl CredentialSync {
    /// Create an orchestrator over `backends`, in processing order.
    ///
    /// # Errors
    /// Returns a validation error when no backend is given or two backends
    /// serve the same system.
    pub fn new(
        backends: Vec<Arc<dyn CredentialBackend>>,
        policy: PasswordPolicy,
        lock_timeout: Duration,
    ) -> SyncResult<Self> {
        if backends.is_empty() {
            return Err(SyncError::validation("At least one backend is required"));
        }

        let mut seen = HashSet::new();
        for backend in &backends {
            let system = backend.system();
            if !seen.insert(system) {
                return Err(SyncError::validation(format!(
                    "Backend for {} registered twice",
                    system
                )));
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                backends,
                policy,
                lock_timeout,
                locks: KeyedLock::new(),
            }),
        })
    }

    /// Registered systems in processing order.
    pub fn systems(&self) -> Vec<SystemKind> {
        self.inner.backends.iter().map(|b| b.system()).collect()
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.inner.policy
    }
}

impl Inner {
    fn is_registered(&self, system: SystemKind) -> bool {
        self.backends.iter().any(|b| b.system() == system)
    }

    /// Authorization, then policy, then request shape.
    fn validate(&self, request: &ChangeRequest) -> SyncResult<()> {
        request.authorize()?;
        request.validate_shape()?;
        self.policy.validate(&request.new_password)?;
        self.policy
            .validate_confirmation(&request.new_password, request.confirm_password.as_ref())?;

        if let Some(system) = request.systems.iter().find(|s| !self.is_registered(**s)) {
            return Err(SyncError::validation(format!(
                "No backend is configured for {}",
                system
            )));
        }
        Ok(())
    }

    #[instrument(
        skip(self, request),
        fields(target = %request.target_username, requester = %request.requester.username)
    )]
    async fn run(&self, request_id: Uuid, request: ChangeRequest) -> SyncResult<ChangeResult> {
        if let Err(e) = self.validate(&request) {
            warn!(%request_id, error = %e, "Change request rejected");
            return Err(e);
        }

        let _guard = self
            .locks
            .acquire(&request.target_username, self.lock_timeout)
            .await
            .map_err(|e| {
                warn!(%request_id, error = %e, "Change request rejected");
                e
            })?;

        let result = Saga::new(request_id, &self.backends, &request).run().await;

        info!(
            %request_id,
            final_state = ?result.final_state,
            overall_success = result.overall_success,
            "Change request finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl SyncService for CredentialSync {
    async fn connectivity(&self) -> ConnectivityReport {
        let probes = self.inner.backends.iter().map(|backend| async move {
            let system = backend.system();
            match backend.test_connection().await {
                Ok(()) => ConnectivityStatus {
                    system,
                    ok: true,
                    message: "connected".to_string(),
                },
                Err(e) => {
                    warn!(system = %system, error = %e, "Connectivity probe failed");
                    ConnectivityStatus {
                        system,
                        ok: false,
                        message: e.to_string(),
                    }
                }
            }
        });

        ConnectivityReport {
            systems: join_all(probes).await,
        }
    }

    async fn change_password(&self, request: ChangeRequest) -> SyncResult<ChangeResult> {
        let request_id = Uuid::new_v4();
        let inner = Arc::clone(&self.inner);

        // Detached so a dropped caller can't interrupt a half-done change
        let task = tokio::spawn(async move { inner.run(request_id, request).await });

        task.await
            .map_err(|e| SyncError::internal(format!("Change task {} failed: {}", request_id, e)))?
    }
}
