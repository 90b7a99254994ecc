//! Utility functions

use std::sync::LazyLock;

use moka::sync::Cache;
use regex::Regex;

/// Compiled glob patterns, keyed by the glob source
static GLOB_CACHE: LazyLock<Cache<String, Option<Regex>>> =
    LazyLock::new(|| Cache::builder().max_capacity(512).build());

/// Translate a glob into an anchored regular expression.
///
/// Follows shell wildcard rules: `*`, `?`, `[abc]`, `[a-z]` and `[!abc]`. A
/// `]` right after `[` or `[!` is a member of the class, a backslash is an
/// ordinary character and an unterminated `[` matches itself literally.
fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut j = i + 1;
                if chars.get(j) == Some(&'!') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str(r"\[");
                } else {
                    let mut body = &chars[i + 1..j];
                    out.push('[');
                    if body.first() == Some(&'!') {
                        out.push('^');
                        body = &body[1..];
                    }
                    for &c in body {
                        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push(']');
                    i = j;
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Check whether `text` matches the glob `pattern` as a whole.
///
/// # Examples
///
/// ```
/// use nwa_common::glob_matches;
///
/// assert!(glob_matches("/api/*", "/api/users/1"));
/// assert!(glob_matches("user:?", "user:1"));
/// assert!(glob_matches("vlan-[0-9]", "vlan-7"));
/// assert!(!glob_matches("/api/*", "/other"));
/// ```
pub fn glob_matches(pattern: &str, text: &str) -> bool {
    let compiled = GLOB_CACHE.get_with_by_ref(pattern, || {
        Regex::new(&glob_to_regex(pattern))
            .inspect_err(|e| tracing::warn!(pattern, error = %e, "Invalid glob pattern"))
            .ok()
    });
    compiled.is_some_and(|re| re.is_match(text))
}
