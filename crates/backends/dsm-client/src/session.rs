//! Administrative DSM session with guaranteed logout.

use std::time::{Duration, Instant};

use domain::Secret;
use reqwest::Client;
use tracing::{debug, warn};

use crate::api::{API_AUTH, SESSION_NAME};

/// Upper bound for the logout round trip
pub const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// A logged-in admin session.
///
/// Owned by exactly one client call. Call [`DsmSession::close`] on every
/// path; if the session is dropped without being closed (cancelled future,
/// panic) the logout is spawned onto the current runtime instead.
pub struct DsmSession {
    sid: Secret,
    expires_at: Instant,
    http: Client,
    auth_url: String,
    closed: bool,
}

impl DsmSession {
    pub(crate) fn new(sid: Secret, ttl: Duration, http: Client, auth_url: String) -> Self {
        Self {
            sid,
            expires_at: Instant::now() + ttl,
            http,
            auth_url,
            closed: false,
        }
    }

    /// Session id to pass as `_sid`.
    pub fn sid(&self) -> &str {
        self.sid.expose()
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Log the session out and consume it.
    pub async fn close(mut self) {
        self.closed = true;
        logout(&self.http, &self.auth_url, self.sid.expose()).await;
    }
}

impl std::fmt::Debug for DsmSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsmSession")
            .field("sid", &self.sid)
            .field("expires_at", &self.expires_at)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for DsmSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let http = self.http.clone();
        let auth_url = std::mem::take(&mut self.auth_url);
        let sid = self.sid.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("DSM session dropped while open, logging out in background");
                handle.spawn(async move {
                    logout(&http, &auth_url, sid.expose()).await;
                });
            }
            Err(_) => warn!("DSM session dropped outside a runtime; it will expire server-side"),
        }
    }
}

async fn logout(http: &Client, auth_url: &str, sid: &str) {
    let result = http
        .post(auth_url)
        .timeout(LOGOUT_TIMEOUT)
        .form(&[
            ("api", API_AUTH),
            ("version", "1"),
            ("method", "logout"),
            ("session", SESSION_NAME),
            ("_sid", sid),
        ])
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => debug!("DSM session logged out"),
        Ok(response) => warn!(
            status = %response.status(),
            "DSM logout returned an error status (non-critical)"
        ),
        Err(e) => warn!(error = %e, "DSM logout error (non-critical)"),
    }
}
