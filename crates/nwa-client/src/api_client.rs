//! API client with per-request headers and uniform error mapping

use std::future::Future;
use std::time::Duration;

use nwa_common::{ApiError, Url, format_error};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::ClientError;

/// Configuration for the API client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            read_timeout_ms: 30000,
        }
    }
}

impl ClientConfig {
    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self
    }
}

/// HTTP client bound to one API
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    headers: HeaderMap,
}

impl ApiClient {
    pub fn new(base_url: impl Into<Url>, config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .map_err(ClientError::Http)?;
        Ok(Self::from_client(client, base_url))
    }

    /// Wrap an existing `reqwest` client
    pub fn from_client(client: Client, base_url: impl Into<Url>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Add a header sent with every request
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(anyhow::Error::from)?;
        let value = HeaderValue::from_str(value).map_err(anyhow::Error::from)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// A client for a single request that also sends `headers`.
    ///
    /// Headers given here override default headers with the same name.
    pub fn with_headers(&self, headers: HeaderMap) -> ApiClient {
        let mut merged = self.headers.clone();
        for (name, value) in headers.iter() {
            merged.insert(name.clone(), value.clone());
        }
        ApiClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            headers: merged,
        }
    }

    /// Start a request to `path` below the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = &self.base_url / path;
        debug!(%method, url = %url, "API request");
        self.client
            .request(method, url.as_str())
            .headers(self.headers.clone())
    }

    /// Send a request and decode a JSON response
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send_json(self.request(Method::GET, path)).await
    }

    pub async fn get_json_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_json(self.request(Method::GET, path).query(query))
            .await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(self.request(Method::POST, path).json(body))
            .await
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(self.request(Method::PUT, path).json(body))
            .await
    }

    /// Send a DELETE and ignore the response body
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        check_status(self.request(Method::DELETE, path).send().await?).await?;
        Ok(())
    }
}

/// Turn a non success response into [`ClientError::Status`]
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    })
}

fn map_call_error(name: &str, key: String, err: &ClientError) -> ApiError {
    match err {
        ClientError::Connection(_) => ApiError::new(
            503,
            key,
            format!("Failed to establish a connection to {}", name),
        ),
        ClientError::Status { status: 404, .. } => ApiError::new(404, key, "Not found"),
        ClientError::Status { status, body, .. } if (400..500).contains(status) => ApiError::new(
            500,
            key,
            format!(
                "Error communicating to {}. Response status code was {} with payload: {}",
                name, status, body
            ),
        ),
        ClientError::Status { status, body, .. } if (500..600).contains(status) => ApiError::new(
            *status,
            key,
            format!(
                "Received server error {} from {} with payload: {}",
                status, name, body
            ),
        ),
        ClientError::Status { status, .. } => {
            ApiError::new(*status, key, format!("Error while accessing {}", name))
        }
        other => ApiError::new(
            500,
            key,
            format!(
                "{}: {}\nThis is most likely a programming error",
                other.kind(),
                other
            ),
        ),
    }
}

/// Run an API call against the service called `name`.
///
/// Every failure is logged with a correlation key and mapped to an
/// [`ApiError`]:
///
/// | failure                  | status | message |
/// |--------------------------|--------|---------|
/// | connection               | 503    | `Failed to establish a connection to <name>` |
/// | 404                      | 404    | `Not found` |
/// | other 4xx                | 500    | `Error communicating to <name>. Response status code was <s> with payload: <body>` |
/// | 5xx                      | `<s>`  | `Received server error <s> from <name> with payload: <body>` |
/// | any other status         | `<s>`  | `Error while accessing <name>` |
/// | anything else            | 500    | `<kind>: <error>` plus a programming error hint |
pub async fn run_api_call<T, Fut>(name: &str, call: Fut) -> Result<T, ApiError>
where
    Fut: Future<Output = Result<T, ClientError>>,
{
    match call.await {
        Ok(value) => Ok(value),
        Err(e) => {
            let (key, formatted) = format_error(&e, None);
            error!(api = name, error_key = %key, "{}", formatted);
            Err(map_call_error(name, key, &e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, body: &str) -> ClientError {
        ClientError::Status {
            status,
            reason: String::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_map_not_found() {
        let err = map_call_error("ims", "abc123".to_string(), &status(404, "gone"));
        assert_eq!(err, ApiError::new(404, "abc123", "Not found"));
    }

    #[test]
    fn test_map_client_error() {
        let err = map_call_error("ims", "k".to_string(), &status(422, "{\"detail\":1}"));
        assert_eq!(err.status, 500);
        assert_eq!(
            err.message,
            "Error communicating to ims. Response status code was 422 with payload: {\"detail\":1}"
        );
    }

    #[test]
    fn test_map_server_error() {
        let err = map_call_error("ims", "k".to_string(), &status(502, "bad gateway"));
        assert_eq!(err.status, 502);
        assert_eq!(
            err.message,
            "Received server error 502 from ims with payload: bad gateway"
        );
    }

    #[test]
    fn test_map_other_status() {
        let err = map_call_error("ims", "k".to_string(), &status(302, ""));
        assert_eq!(err.status, 302);
        assert_eq!(err.message, "Error while accessing ims");
    }

    #[test]
    fn test_map_programming_error() {
        let err = map_call_error(
            "ims",
            "k".to_string(),
            &ClientError::Other(anyhow::anyhow!("list index out of range")),
        );
        assert_eq!(err.status, 500);
        assert_eq!(
            err.message,
            "Error: list index out of range\nThis is most likely a programming error"
        );
    }

    #[test]
    fn test_with_headers_overrides_defaults() {
        let client = ApiClient::new("http://localhost", &ClientConfig::default())
            .unwrap()
            .default_header("x-source", "default")
            .unwrap()
            .default_header("x-keep", "kept")
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-source", HeaderValue::from_static("request"));
        let proxy = client.with_headers(headers);

        assert_eq!(proxy.headers()["x-source"], "request");
        assert_eq!(proxy.headers()["x-keep"], "kept");
        assert_eq!(client.headers()["x-source"], "default");
        assert_eq!(proxy.base_url(), client.base_url());
    }

    #[test]
    fn test_invalid_default_header() {
        let result = ApiClient::new("http://localhost", &ClientConfig::default())
            .unwrap()
            .default_header("bad header", "x");
        assert!(matches!(result, Err(ClientError::Other(_))));
    }
}
