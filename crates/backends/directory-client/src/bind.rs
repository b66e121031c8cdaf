//! Bound LDAP handle with guaranteed unbind.

use ldap3::Ldap;
use tracing::{debug, warn};

/// An LDAP connection bound as the administrative principal.
///
/// Owned by exactly one client call. [`DirectoryBind::close`] unbinds; a
/// bind dropped without being closed is unbound on the current runtime.
pub struct DirectoryBind {
    ldap: Ldap,
    closed: bool,
}

impl DirectoryBind {
    pub(crate) fn new(ldap: Ldap) -> Self {
        Self { ldap, closed: false }
    }

    /// Handle for issuing operations on this bind.
    pub fn ldap(&mut self) -> &mut Ldap {
        &mut self.ldap
    }

    /// Unbind and consume.
    pub async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.ldap.unbind().await {
            warn!(error = %e, "Error during LDAP unbind");
        } else {
            debug!("LDAP unbound");
        }
    }
}

impl Drop for DirectoryBind {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let mut ldap = self.ldap.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = ldap.unbind().await {
                        warn!(error = %e, "Error during background LDAP unbind");
                    }
                });
            }
            Err(_) => warn!("LDAP bind dropped outside a runtime; connection left to close"),
        }
    }
}
