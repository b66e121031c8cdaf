//! Directory Client Library
//!
//! LDAP client for the directory backend. Each call binds as the configured
//! administrative DN, replaces one credential attribute and unbinds.

pub mod bind;
pub mod client;
pub mod codes;

pub use bind::DirectoryBind;
pub use client::DirectoryClient;
