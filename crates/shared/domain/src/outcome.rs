//! Per-system outcomes and the composite change result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::SystemKind;

/// Status of one system after a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    RolledBack,
    RollbackFailed,
    Skipped,
}

impl OutcomeStatus {
    /// Severity rank used to pick the outcome to surface first.
    ///
    /// `RollbackFailed` ranks highest: the backends are now divergent and
    /// need manual reconciliation.
    pub fn severity(&self) -> u8 {
        match self {
            OutcomeStatus::Skipped => 0,
            OutcomeStatus::Succeeded => 1,
            OutcomeStatus::RolledBack => 2,
            OutcomeStatus::Failed => 3,
            OutcomeStatus::RollbackFailed => 4,
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::RolledBack => "rolled back",
            OutcomeStatus::RollbackFailed => "rollback failed",
            OutcomeStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Outcome for a single system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemOutcome {
    pub system: SystemKind,
    pub status: OutcomeStatus,
    pub message: String,
    /// Error code of the failure behind this outcome, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl SystemOutcome {
    pub fn new(system: SystemKind, status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            system,
            status,
            message: message.into(),
            error_code: None,
        }
    }

    pub fn skipped(system: SystemKind) -> Self {
        Self::new(system, OutcomeStatus::Skipped, "not requested")
    }

    /// Attach the error code of the failure that produced this outcome.
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Which password this system holds after the request.
    pub fn password_state(&self) -> PasswordState {
        match self.status {
            OutcomeStatus::Succeeded => PasswordState::New,
            OutcomeStatus::Failed | OutcomeStatus::RolledBack | OutcomeStatus::Skipped => {
                PasswordState::Previous
            }
            OutcomeStatus::RollbackFailed => PasswordState::Unknown,
        }
    }
}

/// Password held by a backend once a request has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordState {
    New,
    Previous,
    /// Possibly new, possibly neither; needs to be checked by hand
    Unknown,
}

/// Lifecycle of one change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    Validating,
    Locking,
    ChangingPrimary,
    ChangingSecondary,
    Committed,
    RollingBack,
    RolledBack,
    RollbackFailed,
    Rejected,
}

impl SagaState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Committed
                | SagaState::RolledBack
                | SagaState::RollbackFailed
                | SagaState::Rejected
        )
    }
}

/// Composite result of a change request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeResult {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub overall_success: bool,
    pub outcomes: Vec<SystemOutcome>,
    pub final_state: SagaState,
}

impl ChangeResult {
    /// Build a result; `overall_success` is derived from the outcomes.
    pub fn new(
        request_id: Uuid,
        requested: &[SystemKind],
        outcomes: Vec<SystemOutcome>,
        final_state: SagaState,
    ) -> Self {
        let overall_success = !requested.is_empty()
            && requested.iter().all(|system| {
                outcomes
                    .iter()
                    .any(|o| o.system == *system && o.status == OutcomeStatus::Succeeded)
            });

        Self {
            request_id,
            timestamp: Utc::now(),
            overall_success,
            outcomes,
            final_state,
        }
    }

    /// Outcome recorded for a system, if it is registered.
    pub fn outcome_for(&self, system: SystemKind) -> Option<&SystemOutcome> {
        self.outcomes.iter().find(|o| o.system == system)
    }

    /// The most severe outcome.
    pub fn most_severe(&self) -> Option<&SystemOutcome> {
        self.outcomes.iter().max_by_key(|o| o.status.severity())
    }

    /// True when the backends are divergent and a human has to reconcile them.
    pub fn requires_reconciliation(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == OutcomeStatus::RollbackFailed)
    }

    /// Human readable account of which backend holds which password.
    pub fn summary(&self) -> String {
        if self.overall_success {
            return "Password changed on every requested system".to_string();
        }

        let mut parts = Vec::new();
        for outcome in self.outcomes.iter().filter(|o| o.status != OutcomeStatus::Skipped) {
            let holds = match outcome.password_state() {
                PasswordState::New => "holds the new password",
                PasswordState::Previous => "still holds the previous password",
                PasswordState::Unknown => "is in an unknown state and must be reconciled manually",
            };
            parts.push(format!("{} {} ({})", outcome.system, holds, outcome.message));
        }

        if self.requires_reconciliation() {
            format!("Systems are divergent: {}", parts.join("; "))
        } else {
            format!("Password change failed: {}", parts.join("; "))
        }
    }
}

/// Probe result for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub system: SystemKind,
    pub ok: bool,
    pub message: String,
}

/// Probe results for every registered backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub systems: Vec<ConnectivityStatus>,
}

impl ConnectivityReport {
    pub fn all_ok(&self) -> bool {
        self.systems.iter().all(|s| s.ok)
    }

    pub fn status_for(&self, system: SystemKind) -> Option<&ConnectivityStatus> {
        self.systems.iter().find(|s| s.system == system)
    }
}
