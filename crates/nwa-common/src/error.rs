//! Error types shared by the NWA crates
//!
//! This module defines:
//! - `NwaError`: generic library error enum
//! - `ApiError`: status/key/message triple returned to API callers

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Generic library errors
#[derive(thiserror::Error, Debug)]
pub enum NwaError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Error value handed back to callers of an API or cache operation.
///
/// `key` is the correlation key that was logged together with the full
/// error, so a user reporting the message can be matched to the log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub status: u16,
    pub key: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
