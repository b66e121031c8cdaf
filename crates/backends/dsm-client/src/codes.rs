//! DSM Web API error codes and their mapping into the sync taxonomy.

use common::SyncError;

/// Codes returned by `SYNO.Core.User` when the account doesn't exist
pub const USER_NOT_FOUND_CODES: &[i64] = &[3106];

/// Codes returned when DSM's own password rules refuse the new password
pub const PASSWORD_REJECTED_CODES: &[i64] = &[412, 3107];

/// Human readable message for a DSM error code.
pub fn describe(code: i64) -> &'static str {
    match code {
        100 => "Unknown error",
        101 => "Invalid parameter",
        102 => "The requested API does not exist",
        103 => "The requested method does not exist",
        104 => "The requested version does not support the functionality",
        105 => "The logged in session does not have permission",
        106 => "Session timeout",
        107 => "Session interrupted by duplicate login",
        119 => "Invalid session",
        400 => "Execution failed",
        401 => "Invalid account or password",
        402 => "Permission denied",
        403 => "One-time password required",
        404 => "One-time password authentication failed",
        406 => "Two-factor enforcement requires setup",
        407 => "Blocked IP address",
        408 => "Expired password cannot be changed",
        409 => "Password expired",
        410 => "Password must be changed",
        411 => "Account disabled",
        412 => "Password change failed",
        413 => "Account locked",
        3106 => "No such user",
        3107 => "Password does not meet the NAS password policy",
        _ => "Unrecognized error",
    }
}

fn message(code: i64) -> String {
    format!("{} (DSM code {})", describe(code), code)
}

/// Map an error returned by the admin login call.
pub fn login_error(code: i64) -> SyncError {
    match code {
        105 | 402 => SyncError::permission(message(code)),
        400 | 401 | 403 | 404 | 406..=411 | 413 => SyncError::auth(message(code)),
        _ => SyncError::connection(message(code)),
    }
}

/// Map an error returned by an API call made inside an admin session.
pub fn call_error(code: i64) -> SyncError {
    match code {
        105 | 402 => SyncError::permission(message(code)),
        106 | 107 | 119 => SyncError::auth(message(code)),
        c if USER_NOT_FOUND_CODES.contains(&c) => SyncError::not_found(message(code)),
        c if PASSWORD_REJECTED_CODES.contains(&c) => SyncError::validation(message(code)),
        _ => SyncError::connection(message(code)),
    }
}
