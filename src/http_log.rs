// HTTP request/response logging with credential redaction
//
// Only the logged copy is ever rewritten; the request handed to the
// transport is never touched.

use serde_json::Value;

use crate::transport::{HttpRequest, HttpResponse};

/// Marker substituted for credentials in logs
pub const REDACTED: &str = "REDACTED";

/// Headers whose values are never logged
const SENSITIVE_HEADERS: &[&str] = &["x-auth-token", "x-subject-token"];

/// Request/response logger owned by one client
#[derive(Clone, Default)]
pub struct HttpLog {
    password: Option<String>,
}

impl HttpLog {
    /// Create a logger that strips `password` from everything it prints
    pub fn new(password: Option<String>) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
        }
    }

    /// Copy of `body` with password fields, token ids and the literal password removed
    pub fn redact_body(&self, body: &str) -> String {
        let structured = match serde_json::from_str::<Value>(body) {
            Ok(mut json) => {
                redact_secret_fields(&mut json);
                json.to_string()
            }
            Err(_) => body.to_string(),
        };

        match &self.password {
            Some(password) => structured.replace(password.as_str(), REDACTED),
            None => structured,
        }
    }

    /// Emit a debug record for an outgoing request
    pub fn log_request(&self, request: &HttpRequest) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }

        let headers: Vec<String> = request
            .headers
            .iter()
            .map(|(name, value)| {
                let shown = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                    REDACTED
                } else {
                    value.to_str().unwrap_or("<binary>")
                };
                format!("{}: {}", name, shown)
            })
            .collect();
        let body = request
            .body
            .as_deref()
            .map(|b| self.redact_body(b))
            .unwrap_or_default();
        // GET /tokens/{id}/endpoints carries the token in the path
        let url = match request.header("x-auth-token") {
            Some(token) if !token.is_empty() => request.url.replace(token, REDACTED),
            _ => request.url.clone(),
        };

        tracing::debug!(
            method = %request.method,
            url = %url,
            headers = ?headers,
            body = %body,
            "REQ"
        );
    }

    /// Emit a debug record for a received response
    pub fn log_response(&self, response: &HttpResponse) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }

        tracing::debug!(
            status = response.status.as_u16(),
            body = %self.redact_body(&response.body),
            "RESP"
        );
    }
}

fn redact_secret_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key.eq_ignore_ascii_case("password") {
                    *child = Value::String(REDACTED.to_string());
                    continue;
                }
                // v2 token responses carry the id in access.token.id
                if key == "token" {
                    if let Some(id) = child.get_mut("id") {
                        *id = Value::String(REDACTED.to_string());
                    }
                }
                redact_secret_fields(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secret_fields),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_redacts_v2_password_credentials() {
        let log = HttpLog::new(Some("s3cret-pw".to_string()));
        let body = json!({
            "auth": {
                "passwordCredentials": {"username": "testuser", "password": "s3cret-pw"},
                "tenantName": "testtenant"
            }
        })
        .to_string();

        let redacted = log.redact_body(&body);
        assert!(redacted.contains(REDACTED));
        assert!(!redacted.contains("s3cret-pw"));
        assert!(redacted.contains("testuser"));
    }

    #[test]
    fn test_redacts_nested_v3_password_without_known_value() {
        let log = HttpLog::new(None);
        let body = json!({
            "auth": {"identity": {"methods": ["password"],
                "password": {"user": {"name": "u", "password": "hunter2"}}}}
        })
        .to_string();

        let redacted = log.redact_body(&body);
        assert!(!redacted.contains("hunter2"));
    }

    #[test]
    fn test_redacts_literal_password_in_plain_text() {
        let log = HttpLog::new(Some("pa55word".to_string()));
        let redacted = log.redact_body("user=admin&secret=pa55word");
        assert_eq!(redacted, "user=admin&secret=REDACTED");
    }

    #[test]
    fn test_redacts_token_id_in_response() {
        let log = HttpLog::new(None);
        let body = json!({
            "access": {
                "token": {"id": "ab12cd34", "tenant": {"id": "tenant-1"}},
                "user": {"id": "user-1"}
            }
        })
        .to_string();

        let redacted = log.redact_body(&body);
        assert!(!redacted.contains("ab12cd34"));
        assert!(redacted.contains("tenant-1"));
        assert!(redacted.contains("user-1"));
    }

    #[test]
    fn test_empty_password_is_ignored() {
        let log = HttpLog::new(Some(String::new()));
        assert_eq!(log.redact_body("plain body"), "plain body");
    }

    #[test]
    fn test_body_without_credentials_is_preserved() {
        let log = HttpLog::new(Some("pw".to_string()));
        let body = r#"{"vip":{"name":"web"}}"#;
        assert_eq!(log.redact_body(body), body);
    }

    proptest! {
        #[test]
        fn prop_logged_body_never_contains_password(
            password in "[a-z0-9]{6,16}",
            username in "[a-z]{1,12}",
            tenant in "[a-z]{1,12}",
        ) {
            let log = HttpLog::new(Some(password.clone()));
            let body = json!({
                "auth": {
                    "passwordCredentials": {"username": username, "password": password},
                    "tenantName": tenant
                }
            })
            .to_string();

            let redacted = log.redact_body(&body);
            prop_assert!(!redacted.contains(&password));
            // The source string is untouched
            prop_assert!(body.contains(&password));
        }
    }
}
