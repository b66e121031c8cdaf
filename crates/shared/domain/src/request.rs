//! Change request entity and related types.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{SYSTEM_DIRECTORY, SYSTEM_DIRECTORY_ALIAS, SYSTEM_DSM};
use crate::error::{DomainError, DomainResult};
use crate::secret::Secret;

/// Identity backends known to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    Dsm,
    Directory,
}

impl SystemKind {
    /// Every known system, in the default processing order.
    pub const ALL: [SystemKind; 2] = [SystemKind::Dsm, SystemKind::Directory];

    /// Stable machine identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemKind::Dsm => SYSTEM_DSM,
            SystemKind::Directory => SYSTEM_DIRECTORY,
        }
    }

    /// Parse a comma separated list such as `dsm,directory`.
    ///
    /// Duplicates are rejected so a processing order is unambiguous.
    pub fn parse_list(value: &str) -> DomainResult<Vec<SystemKind>> {
        let mut systems = Vec::new();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let system: SystemKind = part.parse()?;
            if systems.contains(&system) {
                return Err(DomainError::validation(format!(
                    "System '{}' listed more than once",
                    part
                )));
            }
            systems.push(system);
        }
        Ok(systems)
    }
}

impl FromStr for SystemKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            SYSTEM_DSM => Ok(SystemKind::Dsm),
            SYSTEM_DIRECTORY | SYSTEM_DIRECTORY_ALIAS => Ok(SystemKind::Directory),
            other => Err(DomainError::not_found(format!("system '{}'", other))),
        }
    }
}

impl std::fmt::Display for SystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemKind::Dsm => write!(f, "DSM"),
            SystemKind::Directory => write!(f, "Directory"),
        }
    }
}

/// Identity of whoever asked for the change, as established by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub username: String,
    pub is_admin: bool,
}

impl Requester {
    /// A regular user acting on their own account.
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: false,
        }
    }

    /// An administrator, allowed to act on any account.
    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: true,
        }
    }

    /// Check whether this requester may change the target's password
    pub fn can_change(&self, target_username: &str) -> bool {
        self.is_admin || self.username == target_username
    }
}

/// Password change request.
///
/// Request scoped: never persisted and never logged. `Debug` only shows
/// redacted secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRequest {
    pub requester: Requester,
    pub target_username: String,
    pub new_password: Secret,
    /// Repeated new password, checked when present
    #[serde(default)]
    pub confirm_password: Option<Secret>,
    /// Current password, used only to compensate a partial change
    #[serde(default)]
    pub previous_password: Option<Secret>,
    pub systems: BTreeSet<SystemKind>,
}

impl ChangeRequest {
    /// Create a request targeting every known system.
    pub fn new(
        requester: Requester,
        target_username: impl Into<String>,
        new_password: Secret,
    ) -> Self {
        Self {
            requester,
            target_username: target_username.into(),
            new_password,
            confirm_password: None,
            previous_password: None,
            systems: SystemKind::ALL.into_iter().collect(),
        }
    }

    /// Restrict the request to the given systems.
    pub fn with_systems(mut self, systems: impl IntoIterator<Item = SystemKind>) -> Self {
        self.systems = systems.into_iter().collect();
        self
    }

    /// Supply the password currently set on the target account.
    pub fn with_previous_password(mut self, previous: Secret) -> Self {
        self.previous_password = Some(previous);
        self
    }

    /// Supply the repeated new password.
    pub fn with_confirmation(mut self, confirm: Secret) -> Self {
        self.confirm_password = Some(confirm);
        self
    }

    /// Whether the given system was requested.
    pub fn wants(&self, system: SystemKind) -> bool {
        self.systems.contains(&system)
    }

    /// Authorization gate: admins may act on anyone, users only on themselves.
    ///
    /// # Errors
    /// Returns `DomainError::Forbidden` when the requester may not act on the
    /// target account.
    pub fn authorize(&self) -> DomainResult<()> {
        if self.requester.can_change(&self.target_username) {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!(
                "{} may not change the password of {}",
                self.requester.username, self.target_username
            )))
        }
    }

    /// Structural checks that don't depend on policy.
    pub fn validate_shape(&self) -> DomainResult<()> {
        if self.target_username.trim().is_empty() {
            return Err(DomainError::validation("Target username is required"));
        }
        if self.systems.is_empty() {
            return Err(DomainError::validation("No system selected"));
        }
        Ok(())
    }
}
