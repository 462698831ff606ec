//! Client error types.

/// Errors that can occur when using the MetricFlow client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API key was missing, unknown or expired.
    #[error("unauthorized: check the API key")]
    Unauthorized,

    /// The organization's request quota is used up.
    #[error("rate limit exceeded: {message}")]
    RateLimited {
        /// Server message.
        message: String,
    },

    /// The event was rejected.
    #[error("invalid field {field}: {message}")]
    Validation {
        /// The first offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The referenced resource does not exist in the key's organization.
    #[error("not found: {0}")]
    NotFound(String),

    /// Server returned any other error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
