// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::{ServiceCatalogEntry, V2FlatEndpoint, V2Service, V3Service};
use crate::http_log::REDACTED;

/// Keystone protocol variant used to obtain tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    /// Identity v2.0 password credentials (`POST /tokens`)
    V2Password,

    /// Identity v3 password method (`POST /auth/tokens`)
    V3Password,
}

/// Identity API major version requested by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityVersion {
    V2,
    V3,
}

impl IdentityVersion {
    pub fn plugin(self) -> AuthPlugin {
        match self {
            IdentityVersion::V2 => AuthPlugin::V2Password,
            IdentityVersion::V3 => AuthPlugin::V3Password,
        }
    }
}

/// Credential store
///
/// Either a username/password or user-id/password pair scoped to a tenant,
/// or a pre-supplied token that is trusted until the server rejects it.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub tenant_name: Option<String>,
    pub tenant_id: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,

    // Identity v3 only
    pub user_domain_name: Option<String>,
    pub project_domain_name: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("tenant_name", &self.tenant_name)
            .field("tenant_id", &self.tenant_id)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .field("user_domain_name", &self.user_domain_name)
            .field("project_domain_name", &self.project_domain_name)
            .finish()
    }
}

/// Token obtained from Keystone (or supplied by the caller)
#[derive(Clone)]
pub struct Token {
    pub token_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub service_catalog: Vec<ServiceCatalogEntry>,
}

impl Token {
    /// Wrap a caller-supplied token id; it carries no catalog or expiry
    pub fn presupplied(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            issued_at: Utc::now(),
            expires_at: None,
            tenant_id: None,
            user_id: None,
            service_catalog: Vec::new(),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_id", &REDACTED)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("service_catalog", &self.service_catalog)
            .finish()
    }
}

/// Snapshot of the session's authentication state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthInfo {
    pub auth_token: Option<String>,
    pub auth_tenant_id: Option<String>,
    pub auth_user_id: Option<String>,
    pub endpoint_url: Option<String>,
}

/// Reference by id, as used in token payloads
#[derive(Debug, Default, Deserialize)]
pub struct IdRef {
    #[serde(default)]
    pub id: Option<String>,
}

// === Identity v2 ===

/// `POST /tokens` body
#[derive(Serialize)]
pub struct V2AuthRequest {
    pub auth: V2Auth,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Auth {
    pub password_credentials: V2PasswordCredentials,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
}

#[derive(Serialize)]
pub struct V2PasswordCredentials {
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

/// `POST /tokens` response
#[derive(Deserialize)]
pub struct V2TokenResponse {
    pub access: V2Access,
}

#[derive(Deserialize)]
pub struct V2Access {
    pub token: V2Token,
    #[serde(default, rename = "serviceCatalog")]
    pub service_catalog: Vec<V2Service>,
    #[serde(default)]
    pub user: Option<IdRef>,
}

#[derive(Deserialize)]
pub struct V2Token {
    pub id: String,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub tenant: Option<IdRef>,
}

/// `GET /tokens/{id}/endpoints` response
#[derive(Deserialize)]
pub struct V2EndpointsResponse {
    #[serde(default)]
    pub endpoints: Vec<V2FlatEndpoint>,
}

// === Identity v3 ===

/// `POST /auth/tokens` body
#[derive(Serialize)]
pub struct V3AuthRequest {
    pub auth: V3Auth,
}

#[derive(Serialize)]
pub struct V3Auth {
    pub identity: V3Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<V3Scope>,
}

#[derive(Serialize)]
pub struct V3Identity {
    pub methods: Vec<String>,
    pub password: V3Password,
}

#[derive(Serialize)]
pub struct V3Password {
    pub user: V3User,
}

#[derive(Serialize)]
pub struct V3User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<V3Domain>,
}

#[derive(Serialize)]
pub struct V3Domain {
    pub name: String,
}

#[derive(Serialize)]
pub struct V3Scope {
    pub project: V3Project,
}

#[derive(Serialize)]
pub struct V3Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<V3Domain>,
}

/// `POST /auth/tokens` response body (the id travels in `X-Subject-Token`)
#[derive(Deserialize)]
pub struct V3TokenResponse {
    pub token: V3Token,
}

#[derive(Deserialize)]
pub struct V3Token {
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub catalog: Vec<V3Service>,
    #[serde(default)]
    pub project: Option<IdRef>,
    #[serde(default)]
    pub user: Option<IdRef>,
}

/// `GET /auth/catalog` response
#[derive(Deserialize)]
pub struct V3CatalogResponse {
    #[serde(default)]
    pub catalog: Vec<V3Service>,
}

// === Version discovery ===

/// Body of `GET {auth_url}`: a single version or a version list
#[derive(Deserialize)]
#[serde(untagged)]
pub enum DiscoveryResponse {
    Single { version: VersionEntry },
    Multiple { versions: VersionList },
}

#[derive(Deserialize)]
pub struct VersionList {
    #[serde(default)]
    pub values: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub links: Vec<VersionLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionLink {
    pub href: String,
    #[serde(default)]
    pub rel: Option<String>,
}

impl VersionEntry {
    /// Major identity version this entry advertises
    pub fn identity_version(&self) -> Option<IdentityVersion> {
        if self.id.starts_with("v3") {
            Some(IdentityVersion::V3)
        } else if self.id.starts_with("v2") {
            Some(IdentityVersion::V2)
        } else {
            None
        }
    }

    /// `self` link, the URL to authenticate against for this version
    pub fn self_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel.as_deref() == Some("self"))
            .map(|link| link.href.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials {
            username: Some("testuser".to_string()),
            password: Some("password123".to_string()),
            token: Some("tok-abc".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("testuser"));
        assert!(!debug.contains("password123"));
        assert!(!debug.contains("tok-abc"));
    }

    #[test]
    fn test_token_debug_hides_id() {
        let token = Token::presupplied("f00dfeed");
        assert!(!format!("{:?}", token).contains("f00dfeed"));
        assert!(token.service_catalog.is_empty());
        assert!(token.expires_at.is_none());
    }

    #[test]
    fn test_discovery_single_and_multiple() {
        let single: DiscoveryResponse = serde_json::from_str(
            r#"{"version": {"id": "v3.14", "status": "stable",
                "links": [{"href": "http://keystone:5000/v3/", "rel": "self"}]}}"#,
        )
        .unwrap();
        match single {
            DiscoveryResponse::Single { version } => {
                assert_eq!(version.identity_version(), Some(IdentityVersion::V3));
                assert_eq!(version.self_link(), Some("http://keystone:5000/v3/"));
            }
            DiscoveryResponse::Multiple { .. } => panic!("expected a single version"),
        }

        let multiple: DiscoveryResponse = serde_json::from_str(
            r#"{"versions": {"values": [{"id": "v2.0"}, {"id": "v3.0"}]}}"#,
        )
        .unwrap();
        match multiple {
            DiscoveryResponse::Multiple { versions } => {
                assert_eq!(versions.values.len(), 2);
                assert_eq!(
                    versions.values[0].identity_version(),
                    Some(IdentityVersion::V2)
                );
            }
            DiscoveryResponse::Single { .. } => panic!("expected a version list"),
        }
    }

    #[test]
    fn test_v2_request_serialization_skips_unset_fields() {
        let request = V2AuthRequest {
            auth: V2Auth {
                password_credentials: V2PasswordCredentials {
                    user_id: None,
                    username: Some("testuser".to_string()),
                    password: "pw".to_string(),
                },
                tenant_id: None,
                tenant_name: Some("testtenant".to_string()),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["auth"]["passwordCredentials"]["username"], "testuser");
        assert!(json["auth"]["passwordCredentials"].get("userId").is_none());
        assert_eq!(json["auth"]["tenantName"], "testtenant");
        assert!(json["auth"].get("tenantId").is_none());
    }
}
