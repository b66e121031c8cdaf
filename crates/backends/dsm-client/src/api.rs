//! Wire format of the DSM Web API.

use serde::Deserialize;

/// Authentication API
pub const API_AUTH: &str = "SYNO.API.Auth";

/// API discovery endpoint used by the probe
pub const API_INFO: &str = "SYNO.API.Info";

/// User management API
pub const API_USER: &str = "SYNO.Core.User";

/// Session name shared by login and logout
pub const SESSION_NAME: &str = "UserSettings";

/// Login API version
pub const AUTH_LOGIN_VERSION: &str = "6";

/// Generic response envelope: `{"success": bool, "data": ..., "error": {"code": n}}`
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
}

impl<T> ApiResponse<T> {
    /// Error code of a failed call; DSM code 100 when none was given.
    pub fn error_code(&self) -> i64 {
        self.error.as_ref().map(|e| e.code).unwrap_or(100)
    }
}

/// Payload of a successful login
#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub sid: String,
}
