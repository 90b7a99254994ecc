//! OAuth2 authorization code flow for browser sessions
//!
//! Web applications call [`OAuthClient::force_authorize`] before handling a
//! request and redirect to the returned URL when there is one. The
//! authorization server sends the browser back to the callback URL, where
//! [`OAuthClient::callback`] exchanges the code for tokens and loads the user.

use std::time::Duration;

use nwa_client::ApiClient;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use crate::credentials::bearer_headers;
use crate::{AuthError, SCOPES};

const TOKEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Characters left alone when quoting the redirect state
const STATE_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Per browser session state of the flow
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Quoted URL the user wanted to visit
    pub redirect_state: Option<String>,
    /// Access and refresh token
    pub auth_tokens: Option<(String, String)>,
    /// Token check payload of the logged in user
    pub user: Option<Map<String, Value>>,
}

impl AuthSession {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn clear(&mut self) {
        *self = AuthSession::default();
    }
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

/// Endpoints and credentials of the authorization server
#[derive(Clone, Debug)]
pub struct OAuthClient {
    client_base_url: String,
    client_id: String,
    secret: String,
    check_token_url: String,
    access_token_url: String,
    authorize_url: Url,
    callback_url: String,
    client: Client,
}

impl OAuthClient {
    /// Derive the endpoints from the authorization server base URL.
    ///
    /// The callback defaults to `<client_base_url>/oauth2/callback`.
    pub fn new(
        client_base_url: impl Into<String>,
        oauth2_base_url: &str,
        client_id: impl Into<String>,
        secret: impl Into<String>,
        callback_url: Option<String>,
    ) -> Result<Self, AuthError> {
        let client_base_url = client_base_url.into();
        let callback_url =
            callback_url.unwrap_or_else(|| format!("{}/oauth2/callback", client_base_url));
        let authorize_url = Url::parse(&format!("{}/oauth/authorize", oauth2_base_url))?;
        let client = Client::builder().timeout(TOKEN_TIMEOUT).build()?;
        Ok(Self {
            client_base_url,
            client_id: client_id.into(),
            secret: secret.into(),
            check_token_url: format!("{}/oauth/check_token", oauth2_base_url),
            access_token_url: format!("{}/oauth/token", oauth2_base_url),
            authorize_url,
            callback_url,
            client,
        })
    }

    pub fn check_token_url(&self) -> &str {
        &self.check_token_url
    }

    pub fn access_token_url(&self) -> &str {
        &self.access_token_url
    }

    pub fn authorize_url(&self) -> &str {
        self.authorize_url.as_str()
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Redirect URL to the authorization server for unauthenticated sessions.
    ///
    /// Returns `None` when the session has a user or `path` is the callback
    /// itself. Otherwise the intended URL is remembered in the session.
    pub fn force_authorize(&self, path: &str, session: &mut AuthSession) -> Option<String> {
        let intended_url = format!("{}{}", self.client_base_url, path);
        if session.is_authenticated() || intended_url == self.callback_url {
            return None;
        }

        session.redirect_state = Some(quote(&intended_url));
        debug!(intended_url = %intended_url, "Redirecting to authorization server");

        // The authorization server echoes `state` back decoded, so it carries
        // the plain intended URL and the session keeps the quoted form.
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("state", &intended_url)
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("redirect_uri", &self.callback_url);
        Some(url.into())
    }

    /// Handle the callback and return the URL to redirect the browser to.
    ///
    /// `state` and `code` are the decoded query parameters of the callback.
    pub async fn callback(
        &self,
        session: &mut AuthSession,
        state: Option<&str>,
        code: Option<&str>,
    ) -> Result<String, AuthError> {
        let stored_state = session.redirect_state.clone();
        let target = match (&stored_state, state) {
            (Some(stored), Some(state)) if unquote(stored) == state => state.to_string(),
            _ => {
                return Err(AuthError::Unauthorized(format!(
                    "State does not match: {} vs {}",
                    stored_state.as_deref().unwrap_or("None"),
                    state.unwrap_or("None")
                )));
            }
        };
        session.redirect_state = None;

        let response = self
            .client
            .post(&self.access_token_url)
            .basic_auth(&self.client_id, Some(&self.secret))
            .form(&[
                ("code", code.unwrap_or_default()),
                ("redirect_uri", self.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Unauthorized(format!(
                "Response for obtaining access_token {}",
                body
            )));
        }
        let tokens: TokenPair = response.json().await?;
        session.auth_tokens = Some((tokens.access_token.clone(), tokens.refresh_token));

        let response = self
            .client
            .get(&self.check_token_url)
            .basic_auth(&self.client_id, Some(&self.secret))
            .query(&[("token", tokens.access_token.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Unauthorized(format!(
                "Response for obtaining user info {}",
                body
            )));
        }
        let user: Map<String, Value> = response.json().await?;
        session.user = Some(user);

        info!(target_url = %target, "Authorization code flow completed");
        Ok(target)
    }

    /// A client that sends the session's access token, or `client` itself
    pub fn add_access_token_header(&self, client: &ApiClient, session: &AuthSession) -> ApiClient {
        match &session.auth_tokens {
            Some((access_token, _)) => client.with_headers(bearer_headers(access_token)),
            None => client.clone(),
        }
    }

    /// Clear the session and return the location to redirect to
    pub fn reload_authentication(&self, session: &mut AuthSession) -> String {
        session.clear();
        self.client_base_url.clone()
    }

    /// The logged in user, empty when there is none
    pub fn get_user(&self, session: &AuthSession) -> Map<String, Value> {
        session.user.clone().unwrap_or_default()
    }
}

/// Percent encode everything except unreserved characters and `/`
fn quote(s: &str) -> String {
    utf8_percent_encode(s, STATE_SAFE).to_string()
}

fn unquote(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuthClient {
        OAuthClient::new("http://localhost", "http://authz-server", "core-admin", "secret", None).unwrap()
    }

    #[test]
    fn test_endpoints() {
        let o = oauth();
        assert_eq!(o.check_token_url(), "http://authz-server/oauth/check_token");
        assert_eq!(o.access_token_url(), "http://authz-server/oauth/token");
        assert_eq!(o.authorize_url(), "http://authz-server/oauth/authorize");
        assert_eq!(o.callback_url(), "http://localhost/oauth2/callback");
    }

    #[test]
    fn test_force_authorize() {
        let o = oauth();
        let mut session = AuthSession::default();
        let url = o.force_authorize("/hello", &mut session).unwrap();
        assert_eq!(
            url,
            "http://authz-server/oauth/authorize?response_type=code&state=http%3A%2F%2Flocalhost%2Fhello&client_id=core-admin&scope=read+write+admin&redirect_uri=http%3A%2F%2Flocalhost%2Foauth2%2Fcallback"
        );
        assert_eq!(session.redirect_state.as_deref(), Some("http%3A//localhost/hello"));

        assert!(o.force_authorize("/oauth2/callback", &mut AuthSession::default()).is_none());

        session.user = Some(Map::new());
        assert!(o.force_authorize("/hello", &mut session).is_none());
    }

    #[test]
    fn test_quote_and_unquote() {
        assert_eq!(quote("http://localhost/a b?c=1"), "http%3A//localhost/a%20b%3Fc%3D1");
        assert_eq!(unquote("http%3A//localhost/a%20b%3Fc%3D1"), "http://localhost/a b?c=1");
        assert_eq!(unquote("100%"), "100%");
        assert_eq!(unquote("%zz"), "%zz");
        assert_eq!(quote("/zoek?q=ë"), "/zoek%3Fq%3D%C3%AB");
        assert_eq!(unquote("/zoek%3Fq%3D%C3%AB"), "/zoek?q=ë");
    }

    #[test]
    fn test_force_authorize_encodes_intended_url() {
        let o = oauth();
        let mut session = AuthSession::default();
        let redirect = o.force_authorize("/zoek naar?q=ë&x=1", &mut session).unwrap();

        let redirect = Url::parse(&redirect).unwrap();
        let pairs: Vec<(String, String)> = redirect.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 5);
        assert_eq!(
            pairs[1],
            ("state".to_string(), "http://localhost/zoek naar?q=ë&x=1".to_string())
        );
        assert_eq!(pairs[3], ("scope".to_string(), "read write admin".to_string()));
        assert_eq!(
            session.redirect_state.as_deref(),
            Some("http%3A//localhost/zoek%20naar%3Fq%3D%C3%AB%26x%3D1")
        );
        assert_eq!(
            unquote(session.redirect_state.as_deref().unwrap()),
            "http://localhost/zoek naar?q=ë&x=1"
        );
    }

    #[test]
    fn test_access_token_header_and_reload() {
        let o = oauth();
        let client = ApiClient::new("http://localhost", &Default::default()).unwrap();
        let mut session = AuthSession {
            auth_tokens: Some(("access_token".to_string(), "refresh_token".to_string())),
            ..Default::default()
        };

        let proxy = o.add_access_token_header(&client, &session);
        assert_eq!(proxy.headers()["authorization"], "bearer access_token");

        assert_eq!(o.reload_authentication(&mut session), "http://localhost");
        assert_eq!(session, AuthSession::default());
        assert!(o.get_user(&session).is_empty());
    }
}
