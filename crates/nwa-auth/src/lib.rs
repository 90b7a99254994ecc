//! NWA Auth - OAuth2 for network automation services
//!
//! - [`OAuthFilter`] checks bearer tokens against the authorization server's
//!   token check endpoint and applies [`AccessControl`] rules and [`Scopes`]
//! - [`ClientCredentials`] obtains service tokens for outgoing API calls
//! - [`OAuthClient`] drives the authorization code flow for browser sessions
//!
//! Everything here is framework agnostic: requests are described with
//! [`AuthRequest`] and session state with [`AuthSession`].

pub mod access_control;
pub mod client;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod request;
pub mod scopes;
pub mod user;

pub use access_control::{AccessControl, Condition};
pub use client::{AuthSession, OAuthClient};
pub use credentials::ClientCredentials;
pub use error::AuthError;
pub use filter::{OAuthFilter, current_user, with_current_user};
pub use request::AuthRequest;
pub use scopes::Scopes;
pub use user::UserAttributes;

/// Scopes requested for interactive sessions
pub const SCOPES: [&str; 3] = ["read", "write", "admin"];

/// Format a set of strings the way it appears in user facing messages: `{'a', 'b'}`
pub(crate) fn quoted_set<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let mut items: Vec<&String> = items.into_iter().collect();
    items.sort();
    items.dedup();
    let inner: Vec<String> = items.iter().map(|i| format!("'{}'", i)).collect();
    format!("{{{}}}", inner.join(", "))
}
