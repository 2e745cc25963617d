//! Error types for the Fluence HTTP client.

use thiserror::Error;

/// Errors raised by the Fluence API client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// Raised when the configured host is not an absolute URL.
    #[error("invalid API host '{host}': {message}")]
    InvalidHost {
        /// Host value supplied by configuration.
        host: String,
        /// Parser error text.
        message: String,
    },
    /// Raised when the API key cannot be encoded as a header value.
    #[error("API key contains characters that cannot be sent in an HTTP header")]
    InvalidApiKey,
    /// Raised when the request never produced an HTTP response.
    #[error("request to {path} failed: {message}")]
    Transport {
        /// API path that was requested.
        path: String,
        /// Transport error text.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{path} returned status {status}: {body}")]
    Status {
        /// API path that was requested.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body, used as the error description.
        body: String,
    },
    /// Raised when a success response cannot be decoded.
    #[error("failed to decode response from {path}: {message}")]
    Decode {
        /// API path that was requested.
        path: String,
        /// Decoder error text.
        message: String,
    },
}
