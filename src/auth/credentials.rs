// Credential validation and token timestamp parsing

use chrono::{DateTime, NaiveDateTime, Utc};

use super::types::Credentials;
use crate::error::{NeutronError, Result};

impl Credentials {
    /// True when a username+tenant_name or user_id+tenant_id pair is present
    pub fn has_identity(&self) -> bool {
        let by_name = self.username.is_some() && self.tenant_name.is_some();
        let by_id = self.user_id.is_some() && self.tenant_id.is_some();
        by_name || by_id
    }

    /// Check the credential store can be used
    ///
    /// A pre-supplied token is enough on its own. Otherwise an identity pair
    /// and a password are required.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_some() {
            return Ok(());
        }

        if !self.has_identity() {
            return Err(NeutronError::MissingCredentials(
                "username and tenant_name, or user_id and tenant_id, are required".to_string(),
            ));
        }

        if self.password.is_none() {
            return Err(NeutronError::MissingCredentials(
                "a password is required".to_string(),
            ));
        }

        Ok(())
    }

    /// Password for the auth body, validated beforehand
    pub(crate) fn password_or_err(&self) -> Result<String> {
        self.password
            .clone()
            .ok_or_else(|| NeutronError::MissingCredentials("a password is required".to_string()))
    }
}

/// Parse the timestamp formats Keystone emits
///
/// v2 uses `2026-01-12T10:30:00Z`, v3 adds microseconds
/// (`2026-01-12T10:30:00.000000Z`), and some deployments omit the zone.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| NeutronError::MalformedResponse(format!("invalid timestamp {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named() -> Credentials {
        Credentials {
            username: Some("testuser".to_string()),
            tenant_name: Some("testtenant".to_string()),
            password: Some("password".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_datetime() {
        // Test with Z suffix
        let dt = parse_datetime("2025-01-12T10:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-12T10:30:00+00:00");

        // Test with microseconds (identity v3)
        let dt = parse_datetime("2025-01-12T10:30:00.000000Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-12T10:30:00+00:00");

        // Test without timezone
        let dt = parse_datetime("2025-01-12T10:30:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-12T10:30:00+00:00");

        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_validate_name_pair() {
        assert!(named().validate().is_ok());
    }

    #[test]
    fn test_validate_id_pair() {
        let creds = Credentials {
            user_id: Some("testuser_id".to_string()),
            tenant_id: Some("testtenant_id".to_string()),
            password: Some("password".to_string()),
            ..Default::default()
        };
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn test_validate_mixed_pair_is_rejected() {
        let creds = Credentials {
            username: Some("testuser".to_string()),
            tenant_id: Some("testtenant_id".to_string()),
            password: Some("password".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            creds.validate(),
            Err(NeutronError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_validate_token_short_circuits() {
        let creds = Credentials {
            token: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_password() {
        let mut creds = named();
        creds.password = None;
        assert!(creds.validate().is_err());
    }
}
