//! Client error types

/// Errors that can occur while calling an API
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached
    #[error("Failed to establish a connection: {0}")]
    Connection(#[source] reqwest::Error),

    /// The server answered with a non success status
    #[error("({status})\nReason: {reason}\nHTTP response body: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ClientError::Connection(err)
        } else if let Some(status) = err.status() {
            ClientError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: String::new(),
            }
        } else {
            ClientError::Http(err)
        }
    }
}

impl ClientError {
    /// Short name of the error kind, used in user facing messages
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Connection(_) => "ConnectionError",
            ClientError::Status { .. } => "ApiException",
            ClientError::Http(_) => "HttpError",
            ClientError::Serialization(_) => "SerializationError",
            ClientError::Other(_) => "Error",
        }
    }
}
