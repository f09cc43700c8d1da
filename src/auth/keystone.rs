// Keystone protocol exchanges for identity v2 and v3

use chrono::Utc;
use reqwest::header::{HeaderName, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};

use super::credentials::parse_datetime;
use super::types::{
    AuthPlugin, Credentials, DiscoveryResponse, IdentityVersion, Token, V2Auth, V2AuthRequest,
    V2EndpointsResponse, V2PasswordCredentials, V2TokenResponse, V3Auth, V3AuthRequest,
    V3CatalogResponse, V3Domain, V3Identity, V3Password, V3Project, V3Scope, V3TokenResponse,
    V3User,
};
use crate::catalog::{self, ServiceCatalogEntry};
use crate::error::{NeutronError, Result};
use crate::http_log::HttpLog;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

pub const X_AUTH_TOKEN: &str = "x-auth-token";
pub const X_SUBJECT_TOKEN: &str = "x-subject-token";

/// User-Agent sent on every request
pub const CLIENT_USER_AGENT: &str = concat!("neutron-client/", env!("CARGO_PKG_VERSION"));

const DEFAULT_DOMAIN: &str = "Default";

/// Join a base URL and an absolute path without doubling the slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Build a JSON request with the standard headers
pub(crate) fn json_request(method: Method, url: String, body: Option<String>) -> Result<HttpRequest> {
    let mut request = HttpRequest::new(method, url);
    request.insert_header(ACCEPT, "application/json")?;
    request.insert_header(USER_AGENT, CLIENT_USER_AGENT)?;
    if body.is_some() {
        request.insert_header(CONTENT_TYPE, "application/json")?;
    }
    request.body = body;
    Ok(request)
}

/// Attach a token header
pub(crate) fn with_token(mut request: HttpRequest, token_id: &str) -> Result<HttpRequest> {
    request.insert_header(HeaderName::from_static(X_AUTH_TOKEN), token_id)?;
    Ok(request)
}

/// Send through the transport, logging both directions
pub(crate) async fn exchange(
    transport: &dyn HttpTransport,
    log: &HttpLog,
    request: HttpRequest,
) -> Result<HttpResponse> {
    log.log_request(&request);
    let response = transport.send(request).await?;
    log.log_response(&response);
    Ok(response)
}

fn malformed(what: &str, e: serde_json::Error) -> NeutronError {
    NeutronError::MalformedResponse(format!("Failed to parse {}: {}", what, e))
}

/// Body of `POST /tokens`; ids win over names
pub fn build_v2_request(creds: &Credentials) -> Result<V2AuthRequest> {
    let password = creds.password_or_err()?;
    let (user_id, username) = match &creds.user_id {
        Some(id) => (Some(id.clone()), None),
        None => (None, creds.username.clone()),
    };
    let (tenant_id, tenant_name) = match &creds.tenant_id {
        Some(id) => (Some(id.clone()), None),
        None => (None, creds.tenant_name.clone()),
    };

    Ok(V2AuthRequest {
        auth: V2Auth {
            password_credentials: V2PasswordCredentials {
                user_id,
                username,
                password,
            },
            tenant_id,
            tenant_name,
        },
    })
}

/// Body of `POST /auth/tokens` with the password method and a project scope
pub fn build_v3_request(creds: &Credentials) -> Result<V3AuthRequest> {
    let password = creds.password_or_err()?;
    let user_domain = creds
        .user_domain_name
        .clone()
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());

    let user = match &creds.user_id {
        Some(id) => V3User {
            id: Some(id.clone()),
            name: None,
            password,
            domain: None,
        },
        None => V3User {
            id: None,
            name: creds.username.clone(),
            password,
            domain: Some(V3Domain {
                name: user_domain.clone(),
            }),
        },
    };

    let project = match (&creds.tenant_id, &creds.tenant_name) {
        (Some(id), _) => Some(V3Project {
            id: Some(id.clone()),
            name: None,
            domain: None,
        }),
        (None, Some(name)) => Some(V3Project {
            id: None,
            name: Some(name.clone()),
            domain: Some(V3Domain {
                name: creds.project_domain_name.clone().unwrap_or(user_domain),
            }),
        }),
        (None, None) => None,
    };

    Ok(V3AuthRequest {
        auth: V3Auth {
            identity: V3Identity {
                methods: vec!["password".to_string()],
                password: V3Password { user },
            },
            scope: project.map(|project| V3Scope { project }),
        },
    })
}

/// Authenticate with identity v2 password credentials
pub async fn authenticate_v2(
    transport: &dyn HttpTransport,
    log: &HttpLog,
    auth_url: &str,
    creds: &Credentials,
) -> Result<Token> {
    tracing::info!("Authenticating via Keystone v2...");

    let body = serde_json::to_string(&build_v2_request(creds)?)?;
    let request = json_request(Method::POST, join_url(auth_url, "/tokens"), Some(body))?;
    let response = exchange(transport, log, request).await?;

    if response.status != StatusCode::OK {
        tracing::error!(status = response.status.as_u16(), "Keystone v2 authentication failed");
        return Err(NeutronError::Unauthorized(response.body));
    }

    let data: V2TokenResponse = serde_json::from_str(&response.body)
        .map_err(|e| malformed("Keystone v2 token response", e))?;
    let access = data.access;

    let expires_at = access.token.expires.as_deref().map(parse_datetime).transpose()?;
    let issued_at = match access.token.issued_at.as_deref() {
        Some(s) => parse_datetime(s)?,
        None => Utc::now(),
    };

    let token = Token {
        token_id: access.token.id,
        issued_at,
        expires_at,
        tenant_id: access.token.tenant.and_then(|t| t.id),
        user_id: access.user.and_then(|u| u.id),
        service_catalog: catalog::from_v2_catalog(access.service_catalog),
    };

    tracing::info!(
        expires = ?token.expires_at,
        services = token.service_catalog.len(),
        "Token obtained via Keystone v2"
    );
    Ok(token)
}

/// Authenticate with the identity v3 password method
pub async fn authenticate_v3(
    transport: &dyn HttpTransport,
    log: &HttpLog,
    auth_url: &str,
    creds: &Credentials,
) -> Result<Token> {
    tracing::info!("Authenticating via Keystone v3...");

    let body = serde_json::to_string(&build_v3_request(creds)?)?;
    let request = json_request(Method::POST, join_url(auth_url, "/auth/tokens"), Some(body))?;
    let response = exchange(transport, log, request).await?;

    if !matches!(response.status, StatusCode::OK | StatusCode::CREATED) {
        tracing::error!(status = response.status.as_u16(), "Keystone v3 authentication failed");
        return Err(NeutronError::Unauthorized(response.body));
    }

    let token_id = response
        .header(X_SUBJECT_TOKEN)
        .map(str::to_string)
        .ok_or_else(|| {
            NeutronError::MalformedResponse(
                "Keystone response missing X-Subject-Token header".to_string(),
            )
        })?;

    let data: V3TokenResponse = serde_json::from_str(&response.body)
        .map_err(|e| malformed("Keystone v3 token response", e))?;
    let body = data.token;

    let expires_at = body.expires_at.as_deref().map(parse_datetime).transpose()?;
    let issued_at = match body.issued_at.as_deref() {
        Some(s) => parse_datetime(s)?,
        None => Utc::now(),
    };

    let token = Token {
        token_id,
        issued_at,
        expires_at,
        tenant_id: body.project.and_then(|p| p.id),
        user_id: body.user.and_then(|u| u.id),
        service_catalog: catalog::from_v3_catalog(body.catalog),
    };

    tracing::info!(
        expires = ?token.expires_at,
        services = token.service_catalog.len(),
        "Token obtained via Keystone v3"
    );
    Ok(token)
}

/// Catalog lookup for an existing token
///
/// `Ok(None)` means Keystone rejected the token with 401.
async fn fetch_catalog(
    transport: &dyn HttpTransport,
    log: &HttpLog,
    url: String,
    token_id: &str,
) -> Result<Option<String>> {
    let request = with_token(json_request(Method::GET, url, None)?, token_id)?;
    let response = exchange(transport, log, request).await?;

    match response.status {
        StatusCode::UNAUTHORIZED => Ok(None),
        status if status.is_success() => Ok(Some(response.body)),
        status => Err(NeutronError::Identity {
            status: status.as_u16(),
            message: response.body,
        }),
    }
}

/// `GET /tokens/{id}/endpoints`
pub async fn fetch_catalog_v2(
    transport: &dyn HttpTransport,
    log: &HttpLog,
    auth_url: &str,
    token_id: &str,
) -> Result<Option<Vec<ServiceCatalogEntry>>> {
    let url = join_url(auth_url, &format!("/tokens/{}/endpoints", token_id));
    let Some(body) = fetch_catalog(transport, log, url, token_id).await? else {
        return Ok(None);
    };

    let data: V2EndpointsResponse =
        serde_json::from_str(&body).map_err(|e| malformed("Keystone v2 endpoint list", e))?;
    Ok(Some(catalog::from_v2_endpoints(data.endpoints)))
}

/// `GET /auth/catalog`
pub async fn fetch_catalog_v3(
    transport: &dyn HttpTransport,
    log: &HttpLog,
    auth_url: &str,
    token_id: &str,
) -> Result<Option<Vec<ServiceCatalogEntry>>> {
    let url = join_url(auth_url, "/auth/catalog");
    let Some(body) = fetch_catalog(transport, log, url, token_id).await? else {
        return Ok(None);
    };

    let data: V3CatalogResponse =
        serde_json::from_str(&body).map_err(|e| malformed("Keystone v3 catalog", e))?;
    Ok(Some(catalog::from_v3_catalog(data.catalog)))
}

/// Ask the auth URL which identity versions it serves
///
/// Returns the chosen version and the URL to authenticate against, or
/// `None` when the root does not answer with a usable document.
pub async fn discover(
    transport: &dyn HttpTransport,
    log: &HttpLog,
    auth_url: &str,
) -> Option<(IdentityVersion, String)> {
    let request = json_request(Method::GET, auth_url.to_string(), None).ok()?;
    let response = match exchange(transport, log, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(error = %e, "Identity version discovery failed");
            return None;
        }
    };

    if !(response.status.is_success() || response.status == StatusCode::MULTIPLE_CHOICES) {
        tracing::debug!(
            status = response.status.as_u16(),
            "Identity version discovery returned an error"
        );
        return None;
    }

    let document: DiscoveryResponse = serde_json::from_str(&response.body).ok()?;
    match document {
        DiscoveryResponse::Single { version } => version
            .identity_version()
            .map(|v| (v, auth_url.trim_end_matches('/').to_string())),
        DiscoveryResponse::Multiple { versions } => {
            let pick = |wanted: IdentityVersion| {
                versions
                    .values
                    .iter()
                    .find(|entry| entry.identity_version() == Some(wanted))
            };
            let entry = pick(IdentityVersion::V3).or_else(|| pick(IdentityVersion::V2))?;
            let version = entry.identity_version()?;
            let url = match entry.self_link() {
                Some(href) => href.trim_end_matches('/').to_string(),
                None => join_url(
                    auth_url,
                    match version {
                        IdentityVersion::V3 => "/v3",
                        IdentityVersion::V2 => "/v2.0",
                    },
                ),
            };
            Some((version, url))
        }
    }
}

impl AuthPlugin {
    /// Obtain a fresh token with this protocol variant
    pub async fn authenticate(
        &self,
        transport: &dyn HttpTransport,
        log: &HttpLog,
        auth_url: &str,
        creds: &Credentials,
    ) -> Result<Token> {
        match self {
            AuthPlugin::V2Password => authenticate_v2(transport, log, auth_url, creds).await,
            AuthPlugin::V3Password => authenticate_v3(transport, log, auth_url, creds).await,
        }
    }

    /// Fetch the service catalog visible to an existing token
    pub async fn fetch_catalog(
        &self,
        transport: &dyn HttpTransport,
        log: &HttpLog,
        auth_url: &str,
        token_id: &str,
    ) -> Result<Option<Vec<ServiceCatalogEntry>>> {
        match self {
            AuthPlugin::V2Password => fetch_catalog_v2(transport, log, auth_url, token_id).await,
            AuthPlugin::V3Password => fetch_catalog_v3(transport, log, auth_url, token_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;
    use serde_json::json;

    const AUTH_URL: &str = "http://keystone.example.com:5000/v2.0";

    fn named() -> Credentials {
        Credentials {
            username: Some("testuser".to_string()),
            tenant_name: Some("testtenant".to_string()),
            password: Some("password".to_string()),
            ..Default::default()
        }
    }

    fn with_ids() -> Credentials {
        Credentials {
            username: Some("testuser".to_string()),
            user_id: Some("testuser_id".to_string()),
            tenant_name: Some("testtenant".to_string()),
            tenant_id: Some("testtenant_id".to_string()),
            password: Some("password".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_v2_body_by_name() {
        let json = serde_json::to_value(build_v2_request(&named()).unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"auth": {
                "passwordCredentials": {"username": "testuser", "password": "password"},
                "tenantName": "testtenant"
            }})
        );
    }

    #[test]
    fn test_v2_body_prefers_ids() {
        let json = serde_json::to_value(build_v2_request(&with_ids()).unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"auth": {
                "passwordCredentials": {"userId": "testuser_id", "password": "password"},
                "tenantId": "testtenant_id"
            }})
        );
    }

    #[test]
    fn test_v3_body_by_name_uses_domains() {
        let json = serde_json::to_value(build_v3_request(&named()).unwrap()).unwrap();
        assert_eq!(json["auth"]["identity"]["methods"][0], "password");
        assert_eq!(json["auth"]["identity"]["password"]["user"]["name"], "testuser");
        assert_eq!(
            json["auth"]["identity"]["password"]["user"]["domain"]["name"],
            "Default"
        );
        assert_eq!(json["auth"]["scope"]["project"]["name"], "testtenant");
        assert_eq!(json["auth"]["scope"]["project"]["domain"]["name"], "Default");
    }

    #[test]
    fn test_v3_body_by_id() {
        let json = serde_json::to_value(build_v3_request(&with_ids()).unwrap()).unwrap();
        assert_eq!(json["auth"]["identity"]["password"]["user"]["id"], "testuser_id");
        assert!(json["auth"]["identity"]["password"]["user"].get("domain").is_none());
        assert_eq!(json["auth"]["scope"]["project"]["id"], "testtenant_id");
    }

    #[test]
    fn test_v3_body_unscoped() {
        let creds = Credentials {
            username: Some("u".to_string()),
            password: Some("p".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(build_v3_request(&creds).unwrap()).unwrap();
        assert!(json["auth"].get("scope").is_none());
    }

    #[tokio::test]
    async fn test_authenticate_v2_parses_token_and_catalog() {
        let transport = ScriptedTransport::new();
        transport.push(
            200,
            json!({"access": {
                "token": {"id": "tok-v2", "expires": "2099-01-01T00:00:00Z",
                          "tenant": {"id": "testtenant_id"}},
                "user": {"id": "testuser_id"},
                "serviceCatalog": [{"type": "network", "name": "Neutron Service",
                    "endpoints": [{"region": "RegionOne", "publicURL": "public_localurl"}]}]
            }})
            .to_string(),
        );

        let token = authenticate_v2(transport.as_ref(), &HttpLog::default(), AUTH_URL, &named())
            .await
            .unwrap();

        assert_eq!(token.token_id, "tok-v2");
        assert_eq!(token.tenant_id.as_deref(), Some("testtenant_id"));
        assert_eq!(token.user_id.as_deref(), Some("testuser_id"));
        assert!(token.expires_at.is_some());
        assert_eq!(token.service_catalog.len(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, format!("{}/tokens", AUTH_URL));
        assert_eq!(requests[0].method, Method::POST);
        assert!(requests[0].body.as_deref().unwrap().contains("password"));
    }

    #[tokio::test]
    async fn test_authenticate_v2_rejected() {
        let transport = ScriptedTransport::new();
        transport.push(401, "bad credentials");

        let err = authenticate_v2(transport.as_ref(), &HttpLog::default(), AUTH_URL, &named())
            .await
            .unwrap_err();
        match err {
            NeutronError::Unauthorized(message) => assert_eq!(message, "bad credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authenticate_v3_reads_subject_token() {
        let transport = ScriptedTransport::new();
        transport.push_with_header(
            201,
            X_SUBJECT_TOKEN,
            "tok-v3",
            json!({"token": {
                "expires_at": "2099-01-01T00:00:00.000000Z",
                "issued_at": "2026-01-01T00:00:00.000000Z",
                "project": {"id": "p1"},
                "user": {"id": "u1"},
                "catalog": [{"type": "network", "endpoints": [
                    {"interface": "public", "region": "RegionOne", "url": "public_localurl"}
                ]}]
            }})
            .to_string(),
        );

        let token = authenticate_v3(
            transport.as_ref(),
            &HttpLog::default(),
            "http://keystone:5000/v3",
            &named(),
        )
        .await
        .unwrap();

        assert_eq!(token.token_id, "tok-v3");
        assert_eq!(token.tenant_id.as_deref(), Some("p1"));
        assert_eq!(
            token.service_catalog[0].endpoints.get("publicURL").map(String::as_str),
            Some("public_localurl")
        );
        assert_eq!(
            transport.requests()[0].url,
            "http://keystone:5000/v3/auth/tokens"
        );
    }

    #[tokio::test]
    async fn test_authenticate_v3_missing_subject_token() {
        let transport = ScriptedTransport::new();
        transport.push(201, json!({"token": {}}).to_string());

        let err = authenticate_v3(
            transport.as_ref(),
            &HttpLog::default(),
            "http://keystone:5000/v3",
            &named(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NeutronError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_catalog_v2_unauthorized_is_none() {
        let transport = ScriptedTransport::new();
        transport.push(401, "");

        let result = fetch_catalog_v2(transport.as_ref(), &HttpLog::default(), AUTH_URL, "tok")
            .await
            .unwrap();
        assert!(result.is_none());

        let request = &transport.requests()[0];
        assert_eq!(request.url, format!("{}/tokens/tok/endpoints", AUTH_URL));
        assert_eq!(request.header(X_AUTH_TOKEN), Some("tok"));
    }

    #[tokio::test]
    async fn test_fetch_catalog_v2_error_status() {
        let transport = ScriptedTransport::new();
        transport.push(500, "boom");

        let err = fetch_catalog_v2(transport.as_ref(), &HttpLog::default(), AUTH_URL, "tok")
            .await
            .unwrap_err();
        assert!(matches!(err, NeutronError::Identity { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_discover_single_version() {
        let transport = ScriptedTransport::new();
        transport.push(
            200,
            json!({"version": {"id": "v3.14", "status": "stable"}}).to_string(),
        );

        let found = discover(transport.as_ref(), &HttpLog::default(), "http://keystone:5000/v3/")
            .await;
        assert_eq!(
            found,
            Some((IdentityVersion::V3, "http://keystone:5000/v3".to_string()))
        );
    }

    #[tokio::test]
    async fn test_discover_version_list_prefers_v3() {
        let transport = ScriptedTransport::new();
        transport.push(
            300,
            json!({"versions": {"values": [
                {"id": "v2.0", "links": [{"href": "http://keystone:5000/v2.0/", "rel": "self"}]},
                {"id": "v3.14", "links": [{"href": "http://keystone:5000/v3/", "rel": "self"}]}
            ]}})
            .to_string(),
        );

        let found = discover(transport.as_ref(), &HttpLog::default(), "http://keystone:5000")
            .await;
        assert_eq!(
            found,
            Some((IdentityVersion::V3, "http://keystone:5000/v3".to_string()))
        );
    }

    #[tokio::test]
    async fn test_discover_failure_is_none() {
        let transport = ScriptedTransport::new();
        transport.push(404, "not found");

        let found = discover(transport.as_ref(), &HttpLog::default(), AUTH_URL).await;
        assert!(found.is_none());
    }
}
