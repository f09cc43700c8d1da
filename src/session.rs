// Per-caller session state: resolved endpoint and cached token

use crate::auth::{AuthInfo, Token};
use crate::catalog::{EndpointType, ServiceCatalogEntry, NETWORK_SERVICE_TYPE};

/// Authentication state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No token yet
    Unauthenticated,
    /// A token is cached and believed valid
    Authenticated,
    /// The cached token was rejected and a new one is being obtained
    Reauthenticating,
    /// The last authentication or retry failed
    Failed,
}

/// Session owned by one caller at a time
///
/// The executor takes it by `&mut`, so at most one request per session is
/// in flight.
#[derive(Debug, Clone)]
pub struct Session {
    endpoint_url: Option<String>,
    endpoint_overridden: bool,
    token: Option<Token>,
    state: SessionState,

    /// Interface to pick from the catalog
    pub endpoint_type: EndpointType,

    /// Region to pick from the catalog
    pub region_name: Option<String>,

    /// Catalog service type, `network` for Neutron
    pub service_type: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EndpointType::default(), None)
    }
}

impl Session {
    pub fn new(endpoint_type: EndpointType, region_name: Option<String>) -> Self {
        Self {
            endpoint_url: None,
            endpoint_overridden: false,
            token: None,
            state: SessionState::Unauthenticated,
            endpoint_type,
            region_name,
            service_type: NETWORK_SERVICE_TYPE.to_string(),
        }
    }

    /// Pin the endpoint; catalog resolution will never replace it
    pub fn with_endpoint_override(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self.endpoint_overridden = true;
        self
    }

    /// Start from a token obtained elsewhere
    pub fn with_token(mut self, token_id: impl Into<String>) -> Self {
        self.token = Some(Token::presupplied(token_id));
        self.state = SessionState::Authenticated;
        self
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn is_endpoint_overridden(&self) -> bool {
        self.endpoint_overridden
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.token_id.as_str())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Snapshot of token and endpoint for display
    pub fn auth_info(&self) -> AuthInfo {
        AuthInfo {
            auth_token: self.token.as_ref().map(|t| t.token_id.clone()),
            auth_tenant_id: self.token.as_ref().and_then(|t| t.tenant_id.clone()),
            auth_user_id: self.token.as_ref().and_then(|t| t.user_id.clone()),
            endpoint_url: self.endpoint_url.clone(),
        }
    }

    pub(crate) fn set_token(&mut self, token: Token) {
        self.token = Some(token);
        self.state = SessionState::Authenticated;
    }

    pub(crate) fn discard_token(&mut self) {
        self.token = None;
        self.state = SessionState::Reauthenticating;
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Store a catalog fetched for the current token
    pub(crate) fn attach_catalog(&mut self, catalog: Vec<ServiceCatalogEntry>) {
        if let Some(token) = self.token.as_mut() {
            token.service_catalog = catalog;
        }
    }

    /// Record a catalog-resolved endpoint unless the caller pinned one
    pub(crate) fn set_resolved_endpoint(&mut self, endpoint_url: String) {
        if self.endpoint_overridden {
            return;
        }
        self.endpoint_url = Some(endpoint_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = Session::default();
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.service_type, "network");
        assert_eq!(session.endpoint_type, EndpointType::Public);
        assert!(session.endpoint_url().is_none());
    }

    #[test]
    fn test_override_is_never_replaced() {
        let mut session = Session::default().with_endpoint_override("otherurl");
        session.set_resolved_endpoint("public_localurl".to_string());
        assert_eq!(session.endpoint_url(), Some("otherurl"));
        assert!(session.is_endpoint_overridden());
    }

    #[test]
    fn test_resolved_endpoint_is_replaced() {
        let mut session = Session::default();
        session.set_resolved_endpoint("first".to_string());
        session.set_resolved_endpoint("second".to_string());
        assert_eq!(session.endpoint_url(), Some("second"));
    }

    #[test]
    fn test_presupplied_token_auth_info() {
        let session = Session::default()
            .with_token("token-id")
            .with_endpoint_override("localurl");

        assert_eq!(
            session.auth_info(),
            AuthInfo {
                auth_token: Some("token-id".to_string()),
                auth_tenant_id: None,
                auth_user_id: None,
                endpoint_url: Some("localurl".to_string()),
            }
        );
    }

    #[test]
    fn test_discard_token() {
        let mut session = Session::default().with_token("t");
        session.discard_token();
        assert!(session.auth_token().is_none());
        assert_eq!(session.state(), SessionState::Reauthenticating);
    }
}
