use thiserror::Error;

/// Errors that can occur when building or using an Azure service client.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service answered with a non-success HTTP status.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// A bearer token could not be acquired.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request failed at the transport level.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint URL is invalid.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// The service returned an Azure error envelope.
    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },

    /// A request builder was given an invalid combination of values.
    #[error("Invalid request: {0}")]
    Builder(String),
}

impl ServiceError {
    /// Create an [`ServiceError::Http`] error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create an [`ServiceError::InvalidEndpoint`] error that keeps the parse failure.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: format!("{}: {source}", message.into()),
            source: Some(source),
        }
    }

    /// Returns `true` when the error comes from missing configuration.
    pub fn is_missing_config(&self) -> bool {
        matches!(self, Self::MissingConfig(_))
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
