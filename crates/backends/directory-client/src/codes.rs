//! LDAP result codes and their mapping into the sync taxonomy.

use common::SyncError;

pub const SUCCESS: u32 = 0;
pub const CONSTRAINT_VIOLATION: u32 = 19;
pub const NO_SUCH_OBJECT: u32 = 32;
pub const INVALID_CREDENTIALS: u32 = 49;
pub const INSUFFICIENT_ACCESS_RIGHTS: u32 = 50;

/// Map a non-success LDAP result into a [`SyncError`].
///
/// `context` names the operation or entry the result belongs to.
pub fn result_error(rc: u32, text: &str, context: &str) -> SyncError {
    let detail = if text.is_empty() {
        format!("LDAP code {} on {}", rc, context)
    } else {
        format!("LDAP code {} on {}: {}", rc, context, text)
    };

    match rc {
        INVALID_CREDENTIALS => SyncError::auth(detail),
        INSUFFICIENT_ACCESS_RIGHTS => SyncError::permission(detail),
        NO_SUCH_OBJECT => SyncError::not_found(detail),
        CONSTRAINT_VIOLATION => SyncError::validation(detail),
        _ => SyncError::connection(detail),
    }
}
