//! OAuth2 client credentials flow for service to service calls

use std::time::Duration;

use nwa_client::ApiClient;
use parking_lot::RwLock;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{info, warn};

use crate::AuthError;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Access token obtained with the client credentials grant.
///
/// The grant does not hand out refresh tokens; [`ClientCredentials::refresh`]
/// simply asks for a new access token.
pub struct ClientCredentials {
    token_url: String,
    client_id: String,
    secret: String,
    client: Client,
    access_token: RwLock<Option<String>>,
}

impl ClientCredentials {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(TOKEN_TIMEOUT).build()?;
        Ok(Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            secret: secret.into(),
            client,
            access_token: RwLock::new(None),
        })
    }

    /// Request an access token and store it
    pub async fn obtain(&self) -> Result<String, AuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(client_id = %self.client_id, "Client credentials token request failed");
            return Err(AuthError::Unauthorized(format!(
                "Response for obtaining access_token {}",
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        *self.access_token.write() = Some(token.access_token.clone());
        info!(client_id = %self.client_id, "Obtained client credentials token");
        Ok(token.access_token)
    }

    pub async fn refresh(&self) -> Result<String, AuthError> {
        self.obtain().await
    }

    /// The last obtained access token
    pub fn access_token(&self) -> Option<String> {
        self.access_token.read().clone()
    }

    /// A client that sends the access token, or `client` itself when none was obtained
    pub fn add_token_header(&self, client: &ApiClient) -> ApiClient {
        match self.access_token() {
            Some(token) => client.with_headers(bearer_headers(&token)),
            None => client.clone(),
        }
    }
}

/// `Authorization: bearer <token>` header map
pub(crate) fn bearer_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("bearer {}", token)) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}
