//! Common building blocks shared by the backends and the orchestrator.
//!
//! This crate provides:
//! - The unified error taxonomy
//! - Configuration structures loaded from the environment
//! - The backend capability trait

pub mod backend;
pub mod config;
pub mod error;

pub use backend::CredentialBackend;
#[cfg(any(test, feature = "test-utils"))]
pub use backend::MockCredentialBackend;
pub use config::*;
pub use error::{SyncError, SyncResult};
