use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use crate::auth::{Credentials, IdentityVersion, TokenManager};
use crate::catalog::{EndpointType, RegionFallback};
use crate::commands::Command;
use crate::http_client::{AuthStrategy, NeutronHttpClient};
use crate::session::Session;
use crate::transport::ReqwestTransport;

/// Command-line client for the OpenStack Neutron API
#[derive(Parser, Debug)]
#[command(name = "neutron", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Authentication URL
    #[arg(long, env = "OS_AUTH_URL")]
    pub os_auth_url: Option<String>,

    /// Authentication username
    #[arg(long, env = "OS_USERNAME")]
    pub os_username: Option<String>,

    /// Authentication user ID
    #[arg(long, env = "OS_USER_ID")]
    pub os_user_id: Option<String>,

    /// Authentication password
    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    pub os_password: Option<String>,

    /// Authentication tenant name (falls back to OS_PROJECT_NAME)
    #[arg(long, env = "OS_TENANT_NAME")]
    pub os_tenant_name: Option<String>,

    /// Authentication tenant ID (falls back to OS_PROJECT_ID)
    #[arg(long, env = "OS_TENANT_ID")]
    pub os_tenant_id: Option<String>,

    /// User domain name for identity v3
    #[arg(long, env = "OS_USER_DOMAIN_NAME")]
    pub os_user_domain_name: Option<String>,

    /// Project domain name for identity v3
    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME")]
    pub os_project_domain_name: Option<String>,

    /// Pre-obtained token; skips the initial authentication
    #[arg(long, env = "OS_TOKEN", hide_env_values = true)]
    pub os_token: Option<String>,

    /// Neutron endpoint URL; never replaced by catalog lookup
    #[arg(long, env = "OS_URL")]
    pub os_url: Option<String>,

    /// Region to pick from the service catalog
    #[arg(long, env = "OS_REGION_NAME")]
    pub os_region_name: Option<String>,

    /// Fail instead of using the first catalog entry when the region is missing
    #[arg(long)]
    pub os_region_strict: bool,

    /// Endpoint type (publicURL, adminURL, internalURL)
    #[arg(long, env = "OS_ENDPOINT_TYPE", default_value = "publicURL")]
    pub os_endpoint_type: String,

    /// Authentication strategy (keystone, noauth)
    #[arg(long, env = "OS_AUTH_STRATEGY", default_value = "keystone")]
    pub os_auth_strategy: String,

    /// Identity API version (auto, 2.0, 3)
    #[arg(long, env = "OS_IDENTITY_API_VERSION", default_value = "auto")]
    pub os_identity_api_version: String,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// HTTP request timeout in seconds
    #[arg(long, env = "NEUTRON_HTTP_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "NEUTRON_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Print HTTP traffic (credentials redacted); same as --log-level debug
    #[arg(long)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Keystone
    pub auth_url: Option<String>,
    pub credentials: Credentials,
    pub auth_strategy: AuthStrategy,
    pub identity_version: Option<IdentityVersion>,
    pub token_refresh_threshold: u64,

    // Endpoint selection
    pub endpoint_url: Option<String>,
    pub region_name: Option<String>,
    pub region_fallback: RegionFallback,
    pub endpoint_type: EndpointType,

    // HTTP client
    pub insecure: bool,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        Self::from_args(args)
    }

    pub fn from_args(args: CliArgs) -> Result<(Self, Command)> {
        let credentials = Credentials {
            username: args.os_username,
            user_id: args.os_user_id,
            tenant_name: args
                .os_tenant_name
                .or_else(|| std::env::var("OS_PROJECT_NAME").ok()),
            tenant_id: args
                .os_tenant_id
                .or_else(|| std::env::var("OS_PROJECT_ID").ok()),
            password: args.os_password,
            token: args.os_token,
            user_domain_name: args.os_user_domain_name,
            project_domain_name: args.os_project_domain_name,
        };

        let log_level = if args.debug {
            "debug".to_string()
        } else {
            args.log_level
        };

        let config = Config {
            auth_url: args.os_auth_url,
            credentials,
            auth_strategy: parse_auth_strategy(&args.os_auth_strategy)?,
            identity_version: parse_identity_version(&args.os_identity_api_version)?,

            token_refresh_threshold: std::env::var("TOKEN_REFRESH_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            endpoint_url: args.os_url,
            region_name: args.os_region_name,
            region_fallback: if args.os_region_strict {
                RegionFallback::Strict
            } else {
                RegionFallback::FirstEntry
            },
            endpoint_type: EndpointType::parse(&args.os_endpoint_type),

            insecure: args.insecure,
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.http_timeout,

            log_level,
            log_json: args.log_json,
        };

        Ok((config, args.command))
    }

    /// Validate strategy-specific requirements
    pub fn validate(&self) -> Result<()> {
        match self.auth_strategy {
            AuthStrategy::NoAuth => {
                if self.endpoint_url.is_none() {
                    anyhow::bail!("You must provide a service URL via either --os-url or env[OS_URL]");
                }
            }
            AuthStrategy::Keystone => {
                let has_token = self.credentials.token.is_some();
                if has_token && self.endpoint_url.is_some() {
                    return Ok(());
                }

                if self.auth_url.is_none() {
                    anyhow::bail!(
                        "You must provide an auth url via either --os-auth-url or env[OS_AUTH_URL]"
                    );
                }

                if !has_token {
                    if self.credentials.username.is_none() && self.credentials.user_id.is_none() {
                        anyhow::bail!(
                            "You must provide a username or user ID via --os-username, env[OS_USERNAME] or --os-user-id, env[OS_USER_ID]"
                        );
                    }
                    if self.credentials.tenant_name.is_none() && self.credentials.tenant_id.is_none() {
                        anyhow::bail!(
                            "You must provide a tenant_name or tenant_id via --os-tenant-name, env[OS_TENANT_NAME] or --os-tenant-id, env[OS_TENANT_ID]"
                        );
                    }
                }

                self.credentials
                    .validate()
                    .context("Credentials cannot be used to authenticate")?;
            }
        }

        Ok(())
    }

    /// Build the executor and the session it operates on
    pub fn build_client(&self) -> Result<(NeutronHttpClient, Session)> {
        let transport = ReqwestTransport::new(
            self.http_connect_timeout,
            self.http_request_timeout,
            self.insecure,
        )
        .context("Failed to build HTTP transport")?;

        let tokens = TokenManager::new(
            Arc::new(transport),
            self.credentials.clone(),
            self.auth_url.clone(),
            self.identity_version,
            self.token_refresh_threshold,
        );
        let client = NeutronHttpClient::new(tokens, self.auth_strategy, self.region_fallback);

        let mut session = Session::new(self.endpoint_type.clone(), self.region_name.clone());
        if let Some(url) = &self.endpoint_url {
            session = session.with_endpoint_override(url.clone());
        }
        if let Some(token) = &self.credentials.token {
            session = session.with_token(token.clone());
        }

        Ok((client, session))
    }
}

/// Parse authentication strategy from string
pub fn parse_auth_strategy(s: &str) -> Result<AuthStrategy> {
    match s.to_lowercase().as_str() {
        "keystone" | "" => Ok(AuthStrategy::Keystone),
        "noauth" => Ok(AuthStrategy::NoAuth),
        other => anyhow::bail!("Unknown auth strategy: {}", other),
    }
}

/// Parse identity API version; `None` means discover
pub fn parse_identity_version(s: &str) -> Result<Option<IdentityVersion>> {
    match s.to_lowercase().trim_start_matches('v') {
        "auto" | "" => Ok(None),
        "2" | "2.0" => Ok(Some(IdentityVersion::V2)),
        "3" | "3.0" => Ok(Some(IdentityVersion::V3)),
        other => anyhow::bail!("Unsupported identity API version: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let mut argv = vec!["neutron"];
        argv.extend_from_slice(extra);
        argv.push("list");
        argv.push("vip");
        let args = CliArgs::try_parse_from(argv).unwrap();
        Config::from_args(args).unwrap().0
    }

    #[test]
    fn test_parse_auth_strategy() {
        assert_eq!(parse_auth_strategy("keystone").unwrap(), AuthStrategy::Keystone);
        assert_eq!(parse_auth_strategy("NOAUTH").unwrap(), AuthStrategy::NoAuth);
        assert!(parse_auth_strategy("kerberos").is_err());
    }

    #[test]
    fn test_parse_identity_version() {
        assert_eq!(parse_identity_version("auto").unwrap(), None);
        assert_eq!(parse_identity_version("2.0").unwrap(), Some(IdentityVersion::V2));
        assert_eq!(parse_identity_version("v2.0").unwrap(), Some(IdentityVersion::V2));
        assert_eq!(parse_identity_version("3").unwrap(), Some(IdentityVersion::V3));
        assert!(parse_identity_version("4").is_err());
    }

    #[test]
    fn test_debug_forces_debug_level() {
        let config = parse(&["--log-level", "error", "--debug"]);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_region_strict_flag() {
        assert_eq!(parse(&[]).region_fallback, RegionFallback::FirstEntry);
        assert_eq!(
            parse(&["--os-region-strict"]).region_fallback,
            RegionFallback::Strict
        );
    }

    #[test]
    fn test_endpoint_type_from_cli() {
        let config = parse(&["--os-endpoint-type", "internalURL"]);
        assert_eq!(config.endpoint_type, EndpointType::Internal);
    }

    #[test]
    fn test_validate_keystone_requires_auth_url() {
        let config = parse(&[
            "--os-username",
            "user",
            "--os-tenant-name",
            "tenant",
            "--os-password",
            "secret",
        ]);
        let mut config = config;
        config.auth_url = None;
        assert!(config.validate().is_err());

        config.auth_url = Some("http://keystone:5000/v2.0".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_token_and_url_skip_credentials() {
        let mut config = parse(&[]);
        config.auth_url = None;
        config.credentials = Credentials {
            token: Some("tok".to_string()),
            ..Default::default()
        };
        config.endpoint_url = Some("http://neutron:9696".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_noauth_requires_url() {
        let mut config = parse(&["--os-auth-strategy", "noauth"]);
        config.endpoint_url = None;
        assert!(config.validate().is_err());

        config.endpoint_url = Some("http://neutron:9696".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_client_session() {
        let mut config = parse(&[]);
        config.endpoint_url = Some("http://neutron:9696".to_string());
        config.credentials.token = Some("tok".to_string());

        let (_client, session) = config.build_client().unwrap();
        assert_eq!(session.endpoint_url(), Some("http://neutron:9696"));
        assert!(session.is_endpoint_overridden());
        assert_eq!(session.auth_token(), Some("tok"));
    }
}
