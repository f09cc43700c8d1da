// Error handling module
// Defines the client error taxonomy and transport failures

use thiserror::Error;

/// Failures raised by the HTTP transport itself (no response was received)
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request did not complete within the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection to the remote host could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure (TLS, body read, invalid request)
    #[error("HTTP transport error: {0}")]
    Other(String),
}

/// Errors that can occur while talking to Keystone or Neutron
#[derive(Error, Debug)]
pub enum NeutronError {
    /// Re-authentication is required but there is no auth URL to use
    #[error("An auth_url must be provided to authenticate")]
    NoAuthUrlProvided,

    /// The service catalog has no entry for the requested service
    #[error("Could not find Service or Region in Service Catalog")]
    EndpointNotFound,

    /// The catalog entry exists but lacks the requested interface
    #[error("Could not find endpoint type {endpoint_type} in Service Catalog")]
    EndpointTypeNotFound { endpoint_type: String },

    /// The noauth strategy needs an explicit endpoint URL
    #[error("Could not find endpoint URL: one must be supplied when not using Keystone")]
    EndpointUrlNotFound,

    /// The credential set cannot be used to authenticate
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Keystone rejected the credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Keystone answered a catalog or discovery call with an error status
    #[error("Keystone error: {status} - {message}")]
    Identity { status: u16, message: String },

    /// The request URL exceeds the maximum URI length
    #[error("Request URI too long by {excess} characters")]
    RequestUriTooLong { excess: usize },

    /// A Keystone payload could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A header value contained characters not allowed on the wire
    #[error("Invalid header value for {0}")]
    InvalidHeader(String),

    /// Error response from the Neutron API
    #[error("Neutron API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request never produced a response
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, NeutronError>;
