//! Helper for conveniently constructing URLs
//!
//! The `/` operator appends path elements and [`Url::with_query`] appends a
//! query string. No form of verification is performed: any string can be used
//! to create a `Url`, and appending several query strings yields an improperly
//! formatted URL.
//!
//! ```
//! use nwa_common::Url;
//!
//! let base_url = Url::new("http://example.org/");
//! assert_eq!(&base_url / "/api", &base_url / "api");
//!
//! let url = (&base_url / "api" / "ip" / "address")
//!     .with_query(&[("version", 4)])
//!     .unwrap();
//! assert_eq!(url.as_str(), "http://example.org/api/ip/address?version=4");
//! ```

use std::fmt::{Debug, Display, Formatter};
use std::ops::{Deref, Div};

use serde::{Deserialize, Serialize};

/// String backed URL builder
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Url(String);

impl Url {
    pub fn new(url: impl Into<String>) -> Self {
        Url(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Append a path element.
    ///
    /// A trailing `/` on the URL and a leading `/` on the element collapse into
    /// one separator.
    pub fn join<P: Display>(&self, path: P) -> Url {
        let path = path.to_string();
        Url(format!(
            "{}/{}",
            self.0.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    /// Append a urlencoded query string.
    ///
    /// Spaces become `+` and everything but ASCII alphanumerics and `-._~` is
    /// percent encoded. Returns an error only when `query` cannot be
    /// represented as flat key/value pairs.
    pub fn with_query<Q: Serialize + ?Sized>(
        &self,
        query: &Q,
    ) -> Result<Url, serde_urlencoded::ser::Error> {
        // Form encoding keeps `*` and escapes `~`; a literal `%` is always
        // escaped itself, so `%7E` can only come from a `~`.
        let params = serde_urlencoded::to_string(query)?
            .replace('*', "%2A")
            .replace("%7E", "~");
        Ok(Url(format!("{}?{}", self.0, params)))
    }
}

impl<P: Display> Div<P> for Url {
    type Output = Url;

    fn div(self, path: P) -> Url {
        self.join(path)
    }
}

impl<P: Display> Div<P> for &Url {
    type Output = Url;

    fn div(self, path: P) -> Url {
        self.join(path)
    }
}

impl Deref for Url {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Url {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Url(\"{}\")", self.0)
    }
}

impl From<&str> for Url {
    fn from(value: &str) -> Self {
        Url::new(value)
    }
}

impl From<String> for Url {
    fn from(value: String) -> Self {
        Url(value)
    }
}

impl From<Url> for String {
    fn from(value: Url) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_debug() {
        let base_url = Url::new("http://example.org/");
        assert_eq!(base_url.to_string(), "http://example.org/");
        assert_eq!(format!("{:?}", base_url), "Url(\"http://example.org/\")");
    }

    #[test]
    fn test_slashes_are_collapsed() {
        let base_url = Url::new("http://example.org/");
        assert_eq!(&base_url / "/api", &base_url / "api");
        assert_eq!((&base_url / "api").as_str(), "http://example.org/api");
        assert_eq!((Url::new("http://example.org") / "api/").as_str(), "http://example.org/api/");
    }

    #[test]
    fn test_non_string_path_elements() {
        let api_url = Url::new("http://example.org/api");
        let url = &api_url / 1 / 2 / 3;
        assert_eq!(url.as_str(), "http://example.org/api/1/2/3");
    }

    #[test]
    fn test_query_string() {
        let api_url = Url::new("http://example.org/api");
        let url = (&api_url / "ip" / "address").with_query(&[("version", 4)]).unwrap();
        assert_eq!(url.as_str(), "http://example.org/api/ip/address?version=4");
    }

    #[test]
    fn test_query_string_is_encoded() {
        let api_url = Url::new("http://example.org/api");
        let url = api_url
            .with_query(&[("query", " \"%-.<>\\^_`{|}~")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://example.org/api?query=+%22%25-.%3C%3E%5C%5E_%60%7B%7C%7D~"
        );
    }

    #[test]
    fn test_query_string_unreserved_characters() {
        let api_url = Url::new("http://example.org/api");
        let url = api_url
            .with_query(&[("a~b", "~user*"), ("literal", "%7E")])
            .unwrap();
        assert_eq!(url.as_str(), "http://example.org/api?a~b=~user%2A&literal=%257E");
    }

    #[test]
    fn test_usable_as_str() {
        let url = Url::new("http://example.org");
        assert!(url.starts_with("http://"));
        let s: String = url.into();
        assert_eq!(s, "http://example.org");
    }
}
