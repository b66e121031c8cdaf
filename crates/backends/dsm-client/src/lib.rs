//! DSM Client Library
//!
//! Session-based client for the Synology DSM management Web API. The
//! client logs in as the configured administrator, issues one call and
//! always logs out again.

pub mod api;
pub mod client;
pub mod codes;
pub mod session;

pub use client::DsmClient;
pub use session::DsmSession;
