// Neutron client - authenticated request layer and resource CRUD

pub mod auth;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod http_client;
pub mod http_log;
pub mod resource;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use error::{NeutronError, Result, TransportError};
pub use http_client::{AuthStrategy, NeutronHttpClient};
pub use session::{Session, SessionState};
