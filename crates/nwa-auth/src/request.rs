//! Framework independent view of an incoming request

use std::collections::HashMap;

use http::{HeaderMap, HeaderName, Method};
use serde_json::Value;

/// The parts of an HTTP request that authorization decisions look at
#[derive(Clone, Debug, Default)]
pub struct AuthRequest {
    pub method: Method,
    /// Name of the matched route, when the framework has one
    pub endpoint: Option<String>,
    /// Request URL without the query string
    pub base_url: String,
    pub headers: HeaderMap,
    /// Parameters extracted from the route path
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Parsed JSON body, `None` when the body is absent or not JSON
    pub json: Option<Value>,
}

impl AuthRequest {
    pub fn new(method: Method, base_url: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a header; invalid names or values are skipped
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), value.parse()) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Route name, falling back to the base URL
    pub fn endpoint_or_url(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.base_url)
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }
}
