//! Forward change and compensating rollback across the backends.
//!
//! Runs after validation and while the per-target lock is held. Backends
//! are changed one after the other in registration order; the first
//! failure stops the forward pass and every backend already changed is
//! set back to the previous password, last changed first.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{CredentialBackend, SyncError};
use domain::{ChangeRequest, ChangeResult, OutcomeStatus, SagaState, SystemKind, SystemOutcome};

/// One change request being carried out.
pub struct Saga<'a> {
    request_id: Uuid,
    backends: &'a [Arc<dyn CredentialBackend>],
    request: &'a ChangeRequest,
    state: SagaState,
}

impl<'a> Saga<'a> {
    pub fn new(
        request_id: Uuid,
        backends: &'a [Arc<dyn CredentialBackend>],
        request: &'a ChangeRequest,
    ) -> Self {
        Self {
            request_id,
            backends,
            request,
            state: SagaState::Locking,
        }
    }

    fn transition(&mut self, next: SagaState) {
        debug!(request_id = %self.request_id, from = ?self.state, to = ?next, "Saga transition");
        self.state = next;
    }

    /// Run the forward pass and, on failure, the compensation pass.
    pub async fn run(mut self) -> ChangeResult {
        let (backends, request) = (self.backends, self.request);
        let target = request.target_username.as_str();
        let mut outcomes = Vec::with_capacity(backends.len());
        let mut changed = Vec::new();
        let mut failure: Option<SyncError> = None;

        for (index, backend) in backends.iter().enumerate() {
            let system = backend.system();

            if !request.wants(system) {
                outcomes.push(SystemOutcome::skipped(system));
                continue;
            }
            if failure.is_some() {
                outcomes.push(SystemOutcome::new(
                    system,
                    OutcomeStatus::Skipped,
                    "not attempted after an earlier failure",
                ));
                continue;
            }

            let next = if changed.is_empty() {
                SagaState::ChangingPrimary
            } else {
                SagaState::ChangingSecondary
            };
            self.transition(next);

            match backend.set_password(target, &request.new_password).await {
                Ok(()) => {
                    info!(request_id = %self.request_id, system = %system, "Password changed");
                    changed.push(index);
                    outcomes.push(SystemOutcome::new(
                        system,
                        OutcomeStatus::Succeeded,
                        "password changed",
                    ));
                }
                Err(e) => {
                    warn!(
                        request_id = %self.request_id,
                        system = %system,
                        error = %e,
                        "Password change failed"
                    );
                    outcomes.push(
                        SystemOutcome::new(system, OutcomeStatus::Failed, e.user_message())
                            .with_error_code(e.code()),
                    );
                    failure = Some(e);
                }
            }
        }

        let final_state = match failure {
            None => SagaState::Committed,
            Some(_) => self.compensate(&changed, &mut outcomes).await,
        };
        self.transition(final_state);

        // Known systems without a backend are reported after the configured ones
        for system in SystemKind::ALL {
            if !backends.iter().any(|b| b.system() == system) {
                outcomes.push(SystemOutcome::skipped(system));
            }
        }

        let requested: Vec<SystemKind> = request.systems.iter().copied().collect();
        ChangeResult::new(self.request_id, &requested, outcomes, final_state)
    }

    /// Restore the previous password on every backend in `changed`.
    ///
    /// `changed` holds indexes into both `backends` and `outcomes`, which
    /// line up one to one.
    async fn compensate(&mut self, changed: &[usize], outcomes: &mut [SystemOutcome]) -> SagaState {
        if changed.is_empty() {
            // Nothing was changed, every backend still holds the previous password
            return SagaState::RolledBack;
        }

        self.transition(SagaState::RollingBack);
        let (backends, request) = (self.backends, self.request);
        let target = request.target_username.as_str();
        let mut all_restored = true;

        for &index in changed.iter().rev() {
            let backend = &backends[index];
            let system = backend.system();

            let outcome = match &request.previous_password {
                None => {
                    all_restored = false;
                    let err = SyncError::rollback_failed(format!(
                        "{} holds the new password and no previous password was supplied",
                        system
                    ));
                    error!(
                        request_id = %self.request_id,
                        system = %system,
                        "Rollback impossible without previous password"
                    );
                    SystemOutcome::new(system, OutcomeStatus::RollbackFailed, err.to_string())
                        .with_error_code(err.code())
                }
                Some(previous) => match backend.set_password(target, previous).await {
                    Ok(()) => {
                        info!(
                            request_id = %self.request_id,
                            system = %system,
                            "Previous password restored"
                        );
                        SystemOutcome::new(
                            system,
                            OutcomeStatus::RolledBack,
                            "previous password restored",
                        )
                    }
                    Err(e) => {
                        all_restored = false;
                        let err = SyncError::rollback_failed(format!("{}: {}", system, e));
                        error!(
                            request_id = %self.request_id,
                            system = %system,
                            error = %e,
                            "Rollback failed"
                        );
                        SystemOutcome::new(system, OutcomeStatus::RollbackFailed, err.to_string())
                            .with_error_code(err.code())
                    }
                },
            };
            outcomes[index] = outcome;
        }

        if all_restored {
            SagaState::RolledBack
        } else {
            SagaState::RollbackFailed
        }
    }
}
