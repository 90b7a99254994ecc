//! Error formatting helpers

use std::error::Error;

use rand::Rng;
use rand::distr::Alphanumeric;

const KEY_LENGTH: usize = 6;

/// Generate a random correlation key of six ASCII letters and digits.
pub fn correlation_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Format an error with a random correlation key.
///
/// Returns the key and the formatted string `"[key] <show_error output>"`.
pub fn format_error<E>(err: &E, limit: Option<usize>) -> (String, String)
where
    E: Error + ?Sized,
{
    let key = correlation_key();
    let shown = show_error(err, limit);
    let formatted = format!("[{}] {}", key, shown);
    (key, formatted)
}

/// Show an error with its type name, message and (limited) source chain.
///
/// ```
/// use nwa_common::show_error;
///
/// let err = std::io::Error::other("Something went wrong");
/// assert!(show_error(&err, None).starts_with("Error: Something went wrong\n"));
/// ```
pub fn show_error<E>(err: &E, limit: Option<usize>) -> String
where
    E: Error + ?Sized,
{
    let mut out = format!("{}: {}\n", short_type_name::<E>(), err);

    let mut source = err.source();
    let mut shown = 0;
    while let Some(cause) = source {
        if limit.is_some_and(|l| shown >= l) {
            break;
        }
        out.push_str(&format!("  caused by: {}\n", cause));
        shown += 1;
        source = cause.source();
    }
    out
}

fn short_type_name<E: ?Sized>() -> &'static str {
    let full = std::any::type_name::<E>();
    // Strip generic arguments before taking the last path segment
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: Inner,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("inner failure")]
    struct Inner {
        #[source]
        io: std::io::Error,
    }

    fn nested() -> Outer {
        Outer {
            inner: Inner {
                io: std::io::Error::other("disk on fire"),
            },
        }
    }

    #[test]
    fn test_show_error_includes_type_and_chain() {
        let shown = show_error(&nested(), None);
        assert_eq!(
            shown,
            "Outer: outer failure\n  caused by: inner failure\n  caused by: disk on fire\n"
        );
    }

    #[test]
    fn test_show_error_limit() {
        let shown = show_error(&nested(), Some(1));
        assert_eq!(shown, "Outer: outer failure\n  caused by: inner failure\n");
    }

    #[test]
    fn test_format_error_key() {
        let (key, formatted) = format_error(&nested(), None);
        assert_eq!(key.len(), 6);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(formatted.starts_with(&format!("[{}] Outer: outer failure", key)));
    }

    #[test]
    fn test_correlation_keys_differ() {
        let keys: std::collections::HashSet<String> = (0..20).map(|_| correlation_key()).collect();
        assert!(keys.len() > 1);
    }
}
