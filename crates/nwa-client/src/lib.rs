//! NWA Client - calling other HTTP APIs
//!
//! [`ApiClient`] wraps a `reqwest` client with a base URL and default headers.
//! [`run_api_call`] turns any failure of a call into an [`ApiError`] that can be
//! handed back to the caller of the service.
//!
//! [`ApiError`]: nwa_common::ApiError

pub mod api;
pub mod api_client;
pub mod error;

pub use api::{is_json, request_json};
pub use api_client::{ApiClient, ClientConfig, run_api_call};
pub use error::ClientError;
