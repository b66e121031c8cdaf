//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Systems
// =============================================================================

/// Identifier of the NAS management backend
pub const SYSTEM_DSM: &str = "dsm";

/// Identifier of the directory backend
pub const SYSTEM_DIRECTORY: &str = "directory";

/// Alternate identifier accepted for the directory backend
pub const SYSTEM_DIRECTORY_ALIAS: &str = "ldap";

// =============================================================================
// Validation
// =============================================================================

/// Minimum password length requirement
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum number of character classes (lower, upper, digit, other)
pub const MIN_PASSWORD_CHAR_CLASSES: usize = 1;

/// Number of distinct character classes a password can draw from
pub const PASSWORD_CHAR_CLASS_COUNT: usize = 4;

/// Placeholder rendered instead of secret material
pub const REDACTED: &str = "[REDACTED]";
