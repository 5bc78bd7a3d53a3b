use thiserror::Error;

/// Errors raised by the REST client.
///
/// The event sink never returns these to its caller; a failed delivery is
/// reported as [`DeliveryOutcome::Failed`](crate::DeliveryOutcome::Failed).
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport failure, including request timeouts
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected schema
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Remote configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl NetworkError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the request hit the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;
