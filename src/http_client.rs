use reqwest::{Method, StatusCode};

use crate::auth::keystone::{exchange, join_url, json_request, with_token};
use crate::auth::TokenManager;
use crate::catalog::{resolve_endpoint, RegionFallback};
use crate::error::{NeutronError, Result};
use crate::session::{Session, SessionState};
use crate::transport::HttpResponse;

/// Longest endpoint + path accepted before sending
pub const MAX_URI_LEN: usize = 8192;

/// How requests are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStrategy {
    /// Keystone tokens with re-authentication on 401
    #[default]
    Keystone,

    /// No token at all; the endpoint URL must be supplied
    NoAuth,
}

/// HTTP client for the Neutron API
///
/// Attaches the session token, re-authenticates once when the server
/// answers 401 and retries the request exactly once with the new token.
/// Everything else is handed back to the caller untouched.
pub struct NeutronHttpClient {
    /// Token manager (also owns the transport and the redacting logger)
    tokens: TokenManager,

    /// Keystone or noauth
    strategy: AuthStrategy,

    /// Policy for catalogs without an entry in the requested region
    region_fallback: RegionFallback,
}

impl NeutronHttpClient {
    /// Create a new HTTP client
    pub fn new(tokens: TokenManager, strategy: AuthStrategy, region_fallback: RegionFallback) -> Self {
        Self {
            tokens,
            strategy,
            region_fallback,
        }
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    /// Obtain a new token and, unless pinned, the endpoint from its catalog
    pub async fn authenticate(&self, session: &mut Session) -> Result<()> {
        if self.strategy == AuthStrategy::NoAuth {
            if session.endpoint_url().is_none() {
                return Err(NeutronError::EndpointUrlNotFound);
            }
            return Ok(());
        }

        let token = match self.tokens.authenticate().await {
            Ok(token) => token,
            Err(e) => return fail(session, e),
        };

        if !session.is_endpoint_overridden() {
            match resolve_endpoint(
                &token.service_catalog,
                &session.service_type,
                session.region_name.as_deref(),
                &session.endpoint_type,
                self.region_fallback,
            ) {
                Ok(url) => {
                    tracing::debug!(endpoint = %url, "Resolved endpoint from service catalog");
                    session.set_resolved_endpoint(url);
                }
                Err(e) => return fail(session, e),
            }
        }

        session.set_token(token);
        Ok(())
    }

    /// Resolve the endpoint for a token that came without a catalog
    async fn fetch_endpoint_url(&self, session: &mut Session) -> Result<()> {
        let Some(token_id) = session.auth_token().map(str::to_string) else {
            return self.authenticate(session).await;
        };

        if self.tokens.auth_url().is_none() {
            return fail(session, NeutronError::NoAuthUrlProvided);
        }

        let catalog = match self.tokens.fetch_catalog(&token_id).await {
            Ok(catalog) => catalog,
            Err(e) => return fail(session, e),
        };

        match catalog {
            Some(catalog) => {
                let url = match resolve_endpoint(
                    &catalog,
                    &session.service_type,
                    session.region_name.as_deref(),
                    &session.endpoint_type,
                    self.region_fallback,
                ) {
                    Ok(url) => url,
                    Err(e) => return fail(session, e),
                };
                session.set_resolved_endpoint(url);
                session.attach_catalog(catalog);
                Ok(())
            }
            None => {
                // Token expired between being handed to us and first use
                tracing::warn!("Token rejected while fetching endpoints, re-authenticating...");
                session.discard_token();
                self.authenticate(session).await
            }
        }
    }

    /// Make sure the session has a usable token and endpoint
    ///
    /// A valid token is kept as is; only a missing endpoint is looked up.
    pub(crate) async fn ensure_authenticated(&self, session: &mut Session) -> Result<()> {
        if self.strategy == AuthStrategy::NoAuth {
            return self.authenticate(session).await;
        }

        let needs_token = match session.token() {
            None => true,
            Some(token) => !self.tokens.is_token_valid(token),
        };

        if needs_token {
            return self.authenticate(session).await;
        }

        if session.endpoint_url().is_none() {
            return self.fetch_endpoint_url(session).await;
        }

        Ok(())
    }

    /// Issue one request against the session endpoint
    async fn send(
        &self,
        session: &Session,
        path: &str,
        method: &Method,
        body: Option<&str>,
    ) -> Result<HttpResponse> {
        let endpoint = session
            .endpoint_url()
            .ok_or(NeutronError::EndpointUrlNotFound)?;
        check_uri_length(endpoint, path)?;

        let url = join_url(endpoint, path);
        let mut request = json_request(method.clone(), url, body.map(str::to_string))?;
        if let Some(token_id) = session.auth_token() {
            request = with_token(request, token_id)?;
        }

        exchange(self.tokens.transport(), self.tokens.log(), request).await
    }

    /// Perform an authenticated request against the Neutron endpoint
    ///
    /// Returns the status and body of the final response. Only a 401 is
    /// acted upon, and only once per call.
    pub async fn do_request(
        &self,
        session: &mut Session,
        path: &str,
        method: Method,
        body: Option<&str>,
    ) -> Result<(StatusCode, String)> {
        if self.strategy == AuthStrategy::NoAuth {
            self.authenticate(session).await?;
            let response = self.send(session, path, &method, body).await?;
            return Ok((response.status, response.body));
        }

        self.ensure_authenticated(session).await?;

        let response = self.send(session, path, &method, body).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok((response.status, response.body));
        }

        tracing::warn!(
            method = %method,
            path = path,
            "Received 401, re-authenticating and retrying..."
        );
        session.discard_token();

        if self.tokens.auth_url().is_none() {
            tracing::error!("Token rejected and no auth URL is configured to obtain a new one");
            return fail(session, NeutronError::NoAuthUrlProvided);
        }

        self.authenticate(session).await?;

        let retry = self.send(session, path, &method, body).await?;
        if retry.status == StatusCode::UNAUTHORIZED {
            tracing::error!(
                method = %method,
                path = path,
                "Request still unauthorized after re-authentication"
            );
            session.set_state(SessionState::Failed);
        }

        Ok((retry.status, retry.body))
    }
}

fn fail<T>(session: &mut Session, error: NeutronError) -> Result<T> {
    session.set_state(SessionState::Failed);
    Err(error)
}

fn check_uri_length(endpoint: &str, path: &str) -> Result<()> {
    let uri_len = endpoint.len() + path.len();
    if uri_len > MAX_URI_LEN {
        return Err(NeutronError::RequestUriTooLong {
            excess: uri_len - MAX_URI_LEN,
        });
    }
    Ok(())
}
