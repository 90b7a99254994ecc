//! Auth error types

use serde_json::Value;

/// Errors raised while authenticating or authorizing a request
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("401 Unauthorized: {0}")]
    Unauthorized(String),

    #[error("403 Forbidden: {0}")]
    Forbidden(String),

    #[error("408 Request Timeout: {0}")]
    RequestTimeout(String),

    /// An access rule could not be parsed
    #[error("{message} (rule {rule}):\n{definition}")]
    InvalidRuleDefinition {
        message: String,
        rule: usize,
        definition: Value,
    },

    #[error("Invalid security definitions: {0}")]
    InvalidDefinitions(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// HTTP status code to answer the request with
    pub fn status(&self) -> u16 {
        match self {
            AuthError::Unauthorized(_) => 401,
            AuthError::Forbidden(_) => 403,
            AuthError::RequestTimeout(_) => 408,
            AuthError::InvalidRuleDefinition { .. }
            | AuthError::InvalidDefinitions(_)
            | AuthError::Http(_)
            | AuthError::InvalidUrl(_) => 500,
        }
    }

    /// The message without the status prefix
    pub fn description(&self) -> String {
        match self {
            AuthError::Unauthorized(d) | AuthError::Forbidden(d) | AuthError::RequestTimeout(d) => {
                d.clone()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_and_status() {
        let err = AuthError::Unauthorized("No Authorization token provided".to_string());
        assert_eq!(err.to_string(), "401 Unauthorized: No Authorization token provided");
        assert_eq!(err.status(), 401);
        assert_eq!(err.description(), "No Authorization token provided");

        let err = AuthError::Forbidden("nope".to_string());
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_invalid_rule_display() {
        let err = AuthError::InvalidRuleDefinition {
            message: "Missing endpoint".to_string(),
            rule: 2,
            definition: json!({"methods": ["GET"]}),
        };
        assert_eq!(err.to_string(), "Missing endpoint (rule 2):\n{\"methods\":[\"GET\"]}");
        assert_eq!(err.status(), 500);
    }
}
