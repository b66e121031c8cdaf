//! Domain layer - Core entities and value objects of credential sync.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.
//! Nothing here talks to a backend.

pub mod constants;
pub mod error;
pub mod outcome;
pub mod password;
pub mod request;
pub mod secret;

pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use outcome::{
    ChangeResult, ConnectivityReport, ConnectivityStatus, OutcomeStatus, PasswordState, SagaState,
    SystemOutcome,
};
pub use password::PasswordPolicy;
pub use request::{ChangeRequest, Requester, SystemKind};
pub use secret::Secret;
