use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::keystone;
use super::types::{AuthPlugin, Credentials, IdentityVersion, Token};
use crate::catalog::ServiceCatalogEntry;
use crate::error::{NeutronError, Result};
use crate::http_log::HttpLog;
use crate::transport::HttpTransport;

/// Auth URL and protocol variant chosen for this client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityEndpoint {
    pub plugin: AuthPlugin,
    pub auth_url: String,
}

/// Token manager
/// Performs Keystone authentication and judges cached tokens
pub struct TokenManager {
    /// Transport shared with the request executor
    transport: Arc<dyn HttpTransport>,

    /// Redacting logger for auth traffic
    log: HttpLog,

    /// Credential store
    credentials: Credentials,

    /// Keystone URL; `None` means tokens can never be refreshed
    auth_url: Option<String>,

    /// Explicitly configured identity version (skips discovery)
    identity_version: Option<IdentityVersion>,

    /// Plugin selected on first use
    identity: OnceCell<IdentityEndpoint>,

    /// Tokens expiring within this many seconds are treated as invalid
    refresh_threshold: i64,
}

impl TokenManager {
    /// Create a new TokenManager
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Credentials,
        auth_url: Option<String>,
        identity_version: Option<IdentityVersion>,
        refresh_threshold: u64,
    ) -> Self {
        let log = HttpLog::new(credentials.password.clone());

        Self {
            transport,
            log,
            credentials,
            auth_url,
            identity_version,
            identity: OnceCell::new(),
            refresh_threshold: i64::try_from(refresh_threshold).unwrap_or(i64::MAX),
        }
    }

    pub fn auth_url(&self) -> Option<&str> {
        self.auth_url.as_deref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn log(&self) -> &HttpLog {
        &self.log
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Check a cached token is usable (non-empty and not expiring soon)
    pub fn is_token_valid(&self, token: &Token) -> bool {
        if token.token_id.is_empty() {
            return false;
        }

        match token.expires_at {
            None => true, // Pre-supplied tokens are trusted until a 401
            Some(exp) => {
                // A threshold past the representable range means always refresh
                match Duration::try_seconds(self.refresh_threshold)
                    .and_then(|window| Utc::now().checked_add_signed(window))
                {
                    Some(threshold) => exp > threshold,
                    None => false,
                }
            }
        }
    }

    /// Resolve which plugin and URL to authenticate with, once per client
    pub async fn identity_endpoint(&self) -> Result<&IdentityEndpoint> {
        let auth_url = self
            .auth_url
            .as_deref()
            .ok_or(NeutronError::NoAuthUrlProvided)?;

        Ok(self
            .identity
            .get_or_init(|| self.select_plugin(auth_url))
            .await)
    }

    async fn select_plugin(&self, auth_url: &str) -> IdentityEndpoint {
        let trimmed = auth_url.trim_end_matches('/').to_string();

        if let Some(version) = self.identity_version {
            tracing::debug!(version = ?version, "Using configured identity version");
            return IdentityEndpoint {
                plugin: version.plugin(),
                auth_url: trimmed,
            };
        }

        if let Some((version, url)) =
            keystone::discover(self.transport.as_ref(), &self.log, auth_url).await
        {
            tracing::info!(version = ?version, auth_url = %url, "Discovered identity version");
            return IdentityEndpoint {
                plugin: version.plugin(),
                auth_url: url,
            };
        }

        let version = version_from_url(&trimmed);
        tracing::debug!(
            version = ?version,
            "Identity discovery unavailable, inferring version from auth URL"
        );
        IdentityEndpoint {
            plugin: version.plugin(),
            auth_url: trimmed,
        }
    }

    /// Obtain a fresh token from Keystone
    pub async fn authenticate(&self) -> Result<Token> {
        let identity = self.identity_endpoint().await?;

        if !self.credentials.has_identity() {
            return Err(NeutronError::MissingCredentials(
                "username and tenant_name, or user_id and tenant_id, are required to authenticate"
                    .to_string(),
            ));
        }

        identity
            .plugin
            .authenticate(
                self.transport.as_ref(),
                &self.log,
                &identity.auth_url,
                &self.credentials,
            )
            .await
    }

    /// Fetch the catalog for a token obtained elsewhere
    ///
    /// `Ok(None)` when Keystone rejects the token.
    pub async fn fetch_catalog(&self, token_id: &str) -> Result<Option<Vec<ServiceCatalogEntry>>> {
        let identity = self.identity_endpoint().await?;
        identity
            .plugin
            .fetch_catalog(self.transport.as_ref(), &self.log, &identity.auth_url, token_id)
            .await
    }
}

/// Infer the identity version from the auth URL path
pub fn version_from_url(auth_url: &str) -> IdentityVersion {
    let path = auth_url.trim_end_matches('/');
    if path.ends_with("/v3") || path.contains("/v3/") {
        IdentityVersion::V3
    } else {
        IdentityVersion::V2
    }
}
