//! HTTP client for the Synology DSM management Web API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use common::{CredentialBackend, DsmConfig, SyncError, SyncResult};
use domain::{Secret, SystemKind};

use crate::api::{
    ApiResponse, LoginData, API_AUTH, API_INFO, API_USER, AUTH_LOGIN_VERSION, SESSION_NAME,
};
use crate::codes;
use crate::session::DsmSession;

/// Lifetime assumed for an admin session; a single call never needs longer
pub const SESSION_TTL: Duration = Duration::from_secs(300);

/// DSM backend client.
///
/// Every mutating call opens its own admin session from configuration and
/// closes it before returning. No call is retried.
pub struct DsmClient {
    http: Client,
    config: DsmConfig,
    base_url: String,
}

impl DsmClient {
    /// Create a client from configuration.
    pub fn new(config: DsmConfig) -> SyncResult<Self> {
        let http = Self::build_client(&config)?;
        let base_url = config.base_url();
        debug!(base_url = %base_url, "DSM client configured");

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Build the reqwest client with configuration.
    fn build_client(config: &DsmConfig) -> SyncResult<Client> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout());

        // Configure TLS
        if !config.tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| SyncError::internal(format!("Failed to build HTTP client: {e}")))
    }

    fn url(&self, cgi: &str) -> String {
        format!("{}/{}", self.base_url, cgi)
    }

    /// Decode a DSM response envelope, mapping transport failures.
    async fn decode<T: DeserializeOwned>(
        response: Result<Response, reqwest::Error>,
    ) -> SyncResult<ApiResponse<T>> {
        let response = response.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::connection(format!("DSM returned HTTP {}", status)));
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| SyncError::connection(format!("Invalid DSM response: {e}")))
    }

    /// Authenticate with DSM as admin to get a session.
    async fn login(&self) -> SyncResult<DsmSession> {
        let auth_url = self.url("auth.cgi");
        let response = self
            .http
            .post(&auth_url)
            .form(&[
                ("api", API_AUTH),
                ("version", AUTH_LOGIN_VERSION),
                ("method", "login"),
                ("account", self.config.admin_user.as_str()),
                ("passwd", self.config.admin_password.expose()),
                ("session", SESSION_NAME),
                ("format", "sid"),
            ])
            .send()
            .await;

        let body: ApiResponse<LoginData> = Self::decode(response).await?;
        if !body.success {
            let err = codes::login_error(body.error_code());
            warn!(error = %err, "DSM admin authentication failed");
            return Err(err);
        }

        let sid = body
            .data
            .map(|d| d.sid)
            .filter(|sid| !sid.is_empty())
            .ok_or_else(|| SyncError::connection("DSM login response carried no session id"))?;

        debug!("DSM admin authentication successful");
        Ok(DsmSession::new(
            Secret::new(sid),
            SESSION_TTL,
            self.http.clone(),
            auth_url,
        ))
    }

    /// Issue the password-set call inside an open session.
    async fn change_user_password(
        &self,
        session: &DsmSession,
        username: &str,
        new_password: &Secret,
    ) -> SyncResult<()> {
        if session.is_expired() {
            return Err(SyncError::auth("DSM session expired before use"));
        }

        let response = self
            .http
            .post(self.url("entry.cgi"))
            .form(&[
                ("api", API_USER),
                ("version", "1"),
                ("method", "set"),
                ("name", username),
                ("password", new_password.expose()),
                ("_sid", session.sid()),
            ])
            .send()
            .await;

        let body: ApiResponse<serde_json::Value> = Self::decode(response).await?;
        if body.success {
            Ok(())
        } else {
            Err(codes::call_error(body.error_code()))
        }
    }

    /// Query API discovery; proves the Web API is up without authenticating.
    async fn query_api_info(&self) -> SyncResult<()> {
        let response = self
            .http
            .get(self.url("query.cgi"))
            .query(&[
                ("api", API_INFO),
                ("version", "1"),
                ("method", "query"),
                ("query", API_AUTH),
            ])
            .send()
            .await;

        let body: ApiResponse<serde_json::Value> = Self::decode(response).await?;
        if body.success {
            Ok(())
        } else {
            Err(SyncError::connection(format!(
                "DSM API info query failed: {}",
                codes::describe(body.error_code())
            )))
        }
    }
}

/// Map a reqwest error into the sync taxonomy.
fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::connection("DSM request timed out")
    } else if err.is_connect() {
        SyncError::connection(format!("DSM host unreachable: {err}"))
    } else {
        SyncError::connection(format!("DSM request failed: {err}"))
    }
}

/// Probes report every failure as a connection problem.
fn probe_error(err: SyncError) -> SyncError {
    match err {
        SyncError::Connection(_) => err,
        other => SyncError::connection(other.to_string()),
    }
}

#[async_trait]
impl CredentialBackend for DsmClient {
    fn system(&self) -> SystemKind {
        SystemKind::Dsm
    }

    #[instrument(skip(self), fields(system = "dsm"))]
    async fn test_connection(&self) -> SyncResult<()> {
        self.query_api_info().await?;

        let session = self.login().await.map_err(probe_error)?;
        session.close().await;

        info!("DSM connection test successful");
        Ok(())
    }

    #[instrument(skip(self, new_password), fields(system = "dsm"))]
    async fn set_password(&self, username: &str, new_password: &Secret) -> SyncResult<()> {
        info!(target_user = %username, "Changing DSM password");

        let session = self.login().await?;
        let result = self.change_user_password(&session, username, new_password).await;
        session.close().await;

        match &result {
            Ok(()) => info!(target_user = %username, "DSM password changed"),
            Err(e) => warn!(target_user = %username, error = %e, "DSM password change failed"),
        }
        result
    }
}
