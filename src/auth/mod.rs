// Authentication module
// Keystone token acquisition, catalog lookup and credential handling

mod credentials;
pub mod keystone;
mod manager;
mod types;

pub use credentials::parse_datetime;
pub use manager::{version_from_url, IdentityEndpoint, TokenManager};
pub use types::{AuthInfo, AuthPlugin, Credentials, IdentityVersion, Token};
