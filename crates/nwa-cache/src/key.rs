//! Cache keys built from call arguments
//!
//! A key is a name followed by the rendered scalar arguments, joined by `:`.
//! Keyword arguments follow the positional ones, ordered by keyword. Non
//! scalar arguments (lists, maps, null) are not part of the key.
//!
//! ```
//! use nwa_cache::CacheKey;
//!
//! let key = CacheKey::new("test_func").arg("otherid").kwarg("test_kwarg", 100);
//! assert_eq!(key.render(), "test_func:otherid:100");
//!
//! let key = CacheKey::new("skipped_args").arg(std::collections::HashMap::from([("a", 1)]));
//! assert_eq!(key.render(), "skipped_args");
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    name: String,
    args: Vec<String>,
    kwargs: BTreeMap<String, String>,
}

/// Render a scalar argument, `None` for anything else
fn render_scalar<A: Serialize>(value: &A) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => Some(s),
        Ok(Value::Number(n)) => Some(n.to_string()),
        Ok(Value::Bool(b)) => Some(b.to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Cache key argument could not be rendered");
            None
        }
    }
}

impl CacheKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Add a positional argument
    pub fn arg<A: Serialize>(mut self, value: A) -> Self {
        if let Some(rendered) = render_scalar(&value) {
            self.args.push(rendered);
        }
        self
    }

    /// Add a keyword argument
    pub fn kwarg<A: Serialize>(mut self, name: impl Into<String>, value: A) -> Self {
        if let Some(rendered) = render_scalar(&value) {
            self.kwargs.insert(name.into(), rendered);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rendered arguments, positional first
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .chain(self.kwargs.values())
            .map(String::as_str)
    }

    /// The same arguments under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn render(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.parts())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
