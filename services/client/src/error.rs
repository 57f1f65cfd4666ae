//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use decipher_core::ports::ServiceError;

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A backend call failed or was refused.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Represents an error from the underlying HTTP library while building the client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
