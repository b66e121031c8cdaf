//! Shared configuration structures.
//!
//! Administrative credentials for both backends live here and nowhere else;
//! a change request can never substitute its own credentials.

use std::env;
use std::time::Duration;

use domain::{PasswordPolicy, Secret, SystemKind, MIN_PASSWORD_CHAR_CLASSES, MIN_PASSWORD_LENGTH};
use serde::Deserialize;
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// Default per-call backend timeout in seconds
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;

/// Margin added on top of two backend round trips for the lock wait
pub const LOCK_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Default DSM HTTPS port
pub const DEFAULT_DSM_PORT: u16 = 5001;

/// Default LDAP port
pub const DEFAULT_LDAP_PORT: u16 = 389;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or_default(key, &raw, default),
        Err(_) => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => parse_bool(key, &raw, default),
        Err(_) => default,
    }
}

/// Parse `raw`, keeping `default` (and warning) when it doesn't parse.
fn parse_or_default<T: std::str::FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key = %key, value = %raw, "Unparseable setting, using default");
            default
        }
    }
}

/// Only explicit true/false spellings count; anything else keeps `default`.
fn parse_bool(key: &str, raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(key = %key, value = %raw, default, "Unrecognized boolean setting, using default");
            default
        }
    }
}

/// Synology DSM Web API configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DsmConfig {
    pub host: String,
    pub port: u16,
    pub use_https: bool,
    /// Verify the NAS certificate (self-signed NAS setups turn this off)
    pub tls_verify: bool,
    pub admin_user: String,
    pub admin_password: Secret,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for DsmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsmConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_https", &self.use_https)
            .field("tls_verify", &self.tls_verify)
            .field("admin_user", &self.admin_user)
            .field("admin_password", &self.admin_password)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for DsmConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_DSM_PORT,
            use_https: true,
            tls_verify: true,
            admin_user: "admin".to_string(),
            admin_password: Secret::default(),
            timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
        }
    }
}

impl DsmConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env_string("SYNOLOGY_DSM_HOST", "localhost"),
            port: env_parse("SYNOLOGY_DSM_PORT", DEFAULT_DSM_PORT),
            use_https: env_bool("DSM_USE_HTTPS", true),
            tls_verify: env_bool("DSM_TLS_VERIFY", true),
            admin_user: env_string("SYNOLOGY_DSM_ADMIN_USER", "admin"),
            admin_password: Secret::new(env_string("SYNOLOGY_DSM_ADMIN_PASS", "")),
            timeout_secs: env_parse("BACKEND_TIMEOUT_SECS", DEFAULT_BACKEND_TIMEOUT_SECS),
        }
    }

    /// Base URL of the Web API, e.g. `https://nas:5001/webapi`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{}://{}:{}/webapi", scheme, self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.host.trim().is_empty() {
            return Err(SyncError::validation("SYNOLOGY_DSM_HOST must be set"));
        }
        if self.admin_user.trim().is_empty() || self.admin_password.is_empty() {
            return Err(SyncError::validation(
                "SYNOLOGY_DSM_ADMIN_USER and SYNOLOGY_DSM_ADMIN_PASS must be set",
            ));
        }
        Ok(())
    }
}

/// LDAP directory configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub use_starttls: bool,
    pub tls_verify: bool,
    pub bind_dn: String,
    pub bind_password: Secret,
    /// Container holding user entries, e.g. `cn=users,dc=example,dc=com`
    pub base_dn: String,
    /// RDN attribute naming a user entry inside `base_dn`
    pub user_rdn_attr: String,
    /// Attribute holding the credential
    pub password_attr: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("tls_verify", &self.tls_verify)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password)
            .field("base_dn", &self.base_dn)
            .field("user_rdn_attr", &self.user_rdn_attr)
            .field("password_attr", &self.password_attr)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_LDAP_PORT,
            use_ssl: false,
            use_starttls: false,
            tls_verify: true,
            bind_dn: "cn=root,dc=example,dc=com".to_string(),
            bind_password: Secret::default(),
            base_dn: "cn=users,dc=example,dc=com".to_string(),
            user_rdn_attr: "cn".to_string(),
            password_attr: "userPassword".to_string(),
            timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
        }
    }
}

impl DirectoryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("LDAP_HOST", &defaults.host),
            port: env_parse("LDAP_PORT", defaults.port),
            use_ssl: env_bool("LDAP_USE_SSL", defaults.use_ssl),
            use_starttls: env_bool("LDAP_STARTTLS", defaults.use_starttls),
            tls_verify: env_bool("LDAP_TLS_VERIFY", defaults.tls_verify),
            bind_dn: env_string("LDAP_ADMIN_DN", &defaults.bind_dn),
            bind_password: Secret::new(env_string("LDAP_ADMIN_PASS", "")),
            base_dn: env_string("LDAP_BASE_DN", &defaults.base_dn),
            user_rdn_attr: env_string("LDAP_USER_RDN_ATTR", &defaults.user_rdn_attr),
            password_attr: env_string("LDAP_PASSWORD_ATTR", &defaults.password_attr),
            timeout_secs: env_parse("BACKEND_TIMEOUT_SECS", defaults.timeout_secs),
        }
    }

    /// Server URL, `ldaps://` when SSL is enabled.
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.host.trim().is_empty() || self.base_dn.trim().is_empty() {
            return Err(SyncError::validation("LDAP_HOST and LDAP_BASE_DN must be set"));
        }
        if self.bind_dn.trim().is_empty() || self.bind_password.is_empty() {
            return Err(SyncError::validation(
                "LDAP_ADMIN_DN and LDAP_ADMIN_PASS must be set",
            ));
        }
        if self.use_ssl && self.use_starttls {
            return Err(SyncError::validation(
                "LDAP_USE_SSL and LDAP_STARTTLS are mutually exclusive",
            ));
        }
        Ok(())
    }
}

/// Password policy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub min_length: usize,
    pub min_char_classes: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            min_char_classes: MIN_PASSWORD_CHAR_CLASSES,
        }
    }
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        Self {
            min_length: env_parse("PASSWORD_MIN_LENGTH", MIN_PASSWORD_LENGTH),
            min_char_classes: env_parse("PASSWORD_MIN_CHAR_CLASSES", MIN_PASSWORD_CHAR_CLASSES),
        }
    }

    pub fn policy(&self) -> PasswordPolicy {
        PasswordPolicy::new(self.min_length, self.min_char_classes)
    }
}

/// Top-level configuration of the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub dsm: DsmConfig,
    pub directory: DirectoryConfig,
    pub policy: PolicyConfig,
    /// Order in which backends are changed
    pub order: Vec<SystemKind>,
    /// Bounded wait for the per-user lock
    pub lock_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dsm: DsmConfig::default(),
            directory: DirectoryConfig::default(),
            policy: PolicyConfig::default(),
            order: SystemKind::ALL.to_vec(),
            lock_timeout: default_lock_timeout(DEFAULT_BACKEND_TIMEOUT_SECS),
        }
    }
}

/// Two backend round trips plus a margin.
pub fn default_lock_timeout(backend_timeout_secs: u64) -> Duration {
    Duration::from_secs(backend_timeout_secs.saturating_mul(2) + LOCK_TIMEOUT_MARGIN_SECS)
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns a validation error when `SYNC_ORDER` names an unknown system.
    pub fn from_env() -> SyncResult<Self> {
        let dsm = DsmConfig::from_env();
        let directory = DirectoryConfig::from_env();
        let backend_timeout = dsm.timeout_secs.max(directory.timeout_secs);

        let order = match env::var("SYNC_ORDER") {
            Ok(value) => SystemKind::parse_list(&value)?,
            Err(_) => SystemKind::ALL.to_vec(),
        };

        let default_lock = default_lock_timeout(backend_timeout);
        let lock_timeout = Duration::from_secs(env_parse(
            "SYNC_LOCK_TIMEOUT_SECS",
            default_lock.as_secs(),
        ));

        Ok(Self {
            dsm,
            directory,
            policy: PolicyConfig::from_env(),
            order,
            lock_timeout,
        })
    }

    /// Check that every backend in the processing order is usable.
    pub fn validate(&self) -> SyncResult<()> {
        if self.order.is_empty() {
            return Err(SyncError::validation("SYNC_ORDER must name at least one system"));
        }
        for system in &self.order {
            match system {
                SystemKind::Dsm => self.dsm.validate()?,
                SystemKind::Directory => self.directory.validate()?,
            }
        }
        Ok(())
    }
}
