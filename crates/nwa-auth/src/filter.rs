//! Bearer token filter
//!
//! Checks the access token in the `Authorization` header with the
//! authorization server's check token endpoint, then applies the access
//! rules. The token check payload becomes the current user for the rest of
//! the request when the handler runs inside [`with_current_user`].

use std::future::Future;
use std::time::Duration;

use nwa_common::show_error;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::{AccessControl, AuthError, AuthRequest, Scopes, UserAttributes};

/// Timeout of the token check call
pub const TOKEN_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

tokio::task_local! {
    static CURRENT_USER: UserAttributes;
}

/// Run `fut` with `user` as the current user
pub async fn with_current_user<F: Future>(user: UserAttributes, fut: F) -> F::Output {
    CURRENT_USER.scope(user, fut).await
}

/// The user of the request being handled, if any
pub fn current_user() -> Option<UserAttributes> {
    CURRENT_USER.try_with(Clone::clone).ok()
}

pub struct OAuthFilter {
    access_rules: AccessControl,
    scopes: Option<Scopes>,
    token_check_url: String,
    resource_server_id: String,
    resource_server_secret: String,
    white_listed_urls: Vec<String>,
    client: Client,
}

impl OAuthFilter {
    pub fn new(
        security_definitions: Option<&Value>,
        token_check_url: impl Into<String>,
        resource_server_id: impl Into<String>,
        resource_server_secret: impl Into<String>,
        white_listed_urls: Vec<String>,
    ) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(TOKEN_CHECK_TIMEOUT).build()?;
        Ok(Self {
            access_rules: AccessControl::new(security_definitions)?,
            scopes: None,
            token_check_url: token_check_url.into(),
            resource_server_id: resource_server_id.into(),
            resource_server_secret: resource_server_secret.into(),
            white_listed_urls,
            client,
        })
    }

    /// Also check token scopes against swagger security definitions
    pub fn with_scopes(mut self, scopes: Scopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Authenticate and authorize a request.
    ///
    /// Returns `None` for requests that need no token: CORS preflight and
    /// white listed endpoints.
    pub async fn filter(&self, request: &AuthRequest) -> Result<Option<UserAttributes>, AuthError> {
        if request.method == http::Method::OPTIONS {
            return Ok(None);
        }

        let endpoint = request.endpoint_or_url();
        if self.white_listed_urls.iter().any(|url| endpoint.ends_with(url.as_str())) {
            debug!(endpoint, "White listed endpoint");
            return Ok(None);
        }

        let Some(authorization) = request.authorization().filter(|h| !h.is_empty()) else {
            return Err(AuthError::Unauthorized(
                "No Authorization token provided".to_string(),
            ));
        };

        let mut parts = authorization.split_whitespace();
        let token = match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(token), None) => token,
            _ => {
                return Err(AuthError::Unauthorized(format!(
                    "Invalid authorization header: {}",
                    authorization
                )));
            }
        };

        let user = self.check_token(token).await?;
        if !user.active() {
            return Err(AuthError::Unauthorized(format!(
                "Provided oauth token is not active: {}",
                token
            )));
        }

        self.access_rules.is_allowed(&user, request)?;
        if let Some(scopes) = &self.scopes {
            scopes.is_allowed(&user.scopes(), request.method.as_str(), endpoint)?;
        }

        debug!(user = user.user_name(), endpoint, "Request authorized");
        Ok(Some(user))
    }

    async fn check_token(&self, token: &str) -> Result<UserAttributes, AuthError> {
        let response = self
            .client
            .get(&self.token_check_url)
            .basic_auth(&self.resource_server_id, Some(&self.resource_server_secret))
            .query(&[("token", token)])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("{}", show_error(&e, None));
                return Err(AuthError::RequestTimeout(
                    "RequestTimeout from authorization server".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "Token check rejected token");
            return Err(AuthError::Unauthorized(format!(
                "Provided oauth token is not valid: {}",
                token
            )));
        }

        let payload: Value = response.json().await?;
        Ok(UserAttributes::from_value(payload))
    }
}
