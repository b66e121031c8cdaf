//! LDAP client for the directory backend.

use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{dn_escape, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope};
use tracing::{debug, info, instrument, warn};

use common::{CredentialBackend, DirectoryConfig, SyncError, SyncResult};
use domain::{Secret, SystemKind};

use crate::bind::DirectoryBind;
use crate::codes;

/// Directory backend client.
///
/// Every call connects, binds as the configured admin DN, performs one
/// operation and unbinds. No call is retried.
pub struct DirectoryClient {
    config: DirectoryConfig,
}

impl DirectoryClient {
    /// Create a new directory client with the given configuration.
    pub fn new(config: DirectoryConfig) -> SyncResult<Self> {
        if config.base_dn.trim().is_empty() {
            return Err(SyncError::validation("LDAP base DN must not be empty"));
        }
        if config.password_attr.trim().is_empty() || config.user_rdn_attr.trim().is_empty() {
            return Err(SyncError::validation(
                "LDAP password and RDN attributes must not be empty",
            ));
        }

        Ok(Self { config })
    }

    /// DN of the entry holding the credentials of `username`.
    pub fn entry_dn(&self, username: &str) -> String {
        format!(
            "{}={},{}",
            self.config.user_rdn_attr,
            dn_escape(username),
            self.config.base_dn
        )
    }

    /// Connect and bind as the administrative principal.
    async fn bind(&self) -> SyncResult<DirectoryBind> {
        let url = self.config.url();
        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.timeout())
            .set_starttls(self.config.use_starttls)
            .set_no_tls_verify(!self.config.tls_verify);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| transport_error("connect", e))?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let mut bind = DirectoryBind::new(ldap);
        let result = bind
            .ldap()
            .with_timeout(self.config.timeout())
            .simple_bind(&self.config.bind_dn, self.config.bind_password.expose())
            .await
            .map_err(|e| transport_error("bind", e))?;

        if result.rc != codes::SUCCESS {
            // Release the connection before reporting
            bind.close().await;
            let err = codes::result_error(result.rc, &result.text, "bind");
            warn!(bind_dn = %self.config.bind_dn, error = %err, "LDAP admin bind failed");
            return Err(err);
        }

        debug!(bind_dn = %self.config.bind_dn, "LDAP admin bind successful");
        Ok(bind)
    }

    /// Replace the credential attribute of one entry.
    async fn replace_password(
        &self,
        bind: &mut DirectoryBind,
        dn: &str,
        new_password: &Secret,
    ) -> SyncResult<()> {
        let mods = vec![Mod::Replace(
            self.config.password_attr.as_str(),
            HashSet::from([new_password.expose()]),
        )];

        let result = bind
            .ldap()
            .with_timeout(self.config.timeout())
            .modify(dn, mods)
            .await
            .map_err(|e| transport_error("modify", e))?;

        if result.rc != codes::SUCCESS {
            return Err(codes::result_error(result.rc, &result.text, dn));
        }
        Ok(())
    }

    /// Base-scope read of the user container.
    async fn read_base(&self, bind: &mut DirectoryBind) -> SyncResult<()> {
        let result = bind
            .ldap()
            .with_timeout(self.config.timeout())
            .search(&self.config.base_dn, Scope::Base, "(objectClass=*)", vec!["dn"])
            .await
            .map_err(|e| transport_error("search", e))?;

        let (entries, _res) = result
            .success()
            .map_err(|e| SyncError::connection(format!("Test search failed: {e}")))?;

        if entries.is_empty() {
            return Err(SyncError::connection(format!(
                "Base DN '{}' not found or not accessible",
                self.config.base_dn
            )));
        }
        Ok(())
    }
}

/// Map an ldap3 transport error into the sync taxonomy.
fn transport_error(operation: &str, err: LdapError) -> SyncError {
    SyncError::connection(format!("LDAP {} failed: {}", operation, err))
}

#[async_trait]
impl CredentialBackend for DirectoryClient {
    fn system(&self) -> SystemKind {
        SystemKind::Directory
    }

    #[instrument(skip(self), fields(system = "directory"))]
    async fn test_connection(&self) -> SyncResult<()> {
        let mut bind = self.bind().await.map_err(|e| match e {
            SyncError::Connection(_) => e,
            other => SyncError::connection(other.to_string()),
        })?;
        let result = self.read_base(&mut bind).await;
        bind.close().await;

        if result.is_ok() {
            info!("LDAP connection test successful");
        }
        result
    }

    #[instrument(skip(self, new_password), fields(system = "directory"))]
    async fn set_password(&self, username: &str, new_password: &Secret) -> SyncResult<()> {
        let dn = self.entry_dn(username);
        info!(dn = %dn, "Changing LDAP password");

        let mut bind = self.bind().await?;
        let result = self.replace_password(&mut bind, &dn, new_password).await;
        bind.close().await;

        match &result {
            Ok(()) => info!(dn = %dn, "LDAP password changed"),
            Err(e) => warn!(dn = %dn, error = %e, "LDAP password change failed"),
        }
        result
    }
}
