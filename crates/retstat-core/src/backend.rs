// ── Remote catalog/query seam ──
//
// The core never talks HTTP directly. Discovery and aggregation are
// generic over `RetsBackend`; `HttpBackend` adapts `retstat_api::RetsClient`
// and holds the capabilities of the current login.

use std::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use retstat_api::transport::{TlsMode, TransportConfig};
use retstat_api::{Capabilities, Credentials, MetadataKind, MetadataRow, RetsClient};

use crate::config::{ConnectionConfig, TlsVerification};
use crate::error::CoreError;

/// The remote catalog and query capability one session needs.
///
/// Calls on one backend are never concurrent: a session runs its login,
/// metadata walk, and count queries strictly in sequence.
pub trait RetsBackend: Send + Sync {
    /// Open a server session.
    fn login(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Close the server session. Best effort.
    fn logout(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Fetch the rows of one metadata table scoped by `id`.
    fn get_metadata(
        &self,
        kind: MetadataKind,
        id: &str,
    ) -> impl Future<Output = Result<Vec<MetadataRow>, CoreError>> + Send;

    /// Count the records of `resource`/`class` matching a DMQL2 `query`.
    fn count(
        &self,
        resource: &str,
        class: &str,
        query: &str,
    ) -> impl Future<Output = Result<u64, CoreError>> + Send;
}

/// Run `work` inside one login.
///
/// Logout is always attempted afterwards; its failure is logged and
/// never replaces the result of `work`.
pub async fn with_login<B, T>(
    backend: &B,
    work: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError>
where
    B: RetsBackend,
{
    backend.login().await?;
    let result = work.await;
    if let Err(e) = backend.logout().await {
        warn!(error = %e, "logout failed (non-fatal)");
    }
    result
}

// ── HttpBackend ──────────────────────────────────────────────────

/// `RetsBackend` over HTTP.
#[derive(Debug)]
pub struct HttpBackend {
    client: RetsClient,
    capabilities: Mutex<Option<Capabilities>>,
}

impl HttpBackend {
    /// Build the HTTP client for one connection. Does NOT log in.
    pub fn new(config: &ConnectionConfig) -> Result<Self, CoreError> {
        let tls = match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        let transport = TransportConfig {
            tls,
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
            cookie_jar: None,
        }
        .with_cookie_jar();

        let mut credentials = Credentials::new(config.username.clone(), config.password.clone());
        if let Some(ref ua_password) = config.user_agent_password {
            credentials = credentials.with_user_agent_password(ua_password.clone());
        }

        let client = RetsClient::new(
            config.url.clone(),
            credentials,
            config.rets_version.clone(),
            &transport,
        )?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing client.
    pub fn with_client(client: RetsClient) -> Self {
        Self {
            client,
            capabilities: Mutex::new(None),
        }
    }

    async fn capabilities(&self) -> Result<Capabilities, CoreError> {
        self.capabilities
            .lock()
            .await
            .clone()
            .ok_or_else(|| retstat_api::Error::NotLoggedIn.into())
    }
}

impl RetsBackend for HttpBackend {
    async fn login(&self) -> Result<(), CoreError> {
        let caps = self.client.login().await?;
        *self.capabilities.lock().await = Some(caps);
        Ok(())
    }

    async fn logout(&self) -> Result<(), CoreError> {
        let Some(caps) = self.capabilities.lock().await.take() else {
            debug!("logout skipped: no active login");
            return Ok(());
        };
        self.client.logout(&caps).await?;
        Ok(())
    }

    async fn get_metadata(
        &self,
        kind: MetadataKind,
        id: &str,
    ) -> Result<Vec<MetadataRow>, CoreError> {
        let caps = self.capabilities().await?;
        Ok(self.client.get_metadata(&caps, kind, id).await?)
    }

    async fn count(&self, resource: &str, class: &str, query: &str) -> Result<u64, CoreError> {
        let caps = self.capabilities().await?;
        Ok(self.client.count(&caps, resource, class, query).await?)
    }
}
