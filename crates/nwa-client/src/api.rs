//! Request body helpers

use reqwest::StatusCode;
use serde_json::Value;

/// Whether a `Content-Type` value denotes JSON (`application/json` or `*+json`)
pub fn is_json(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Parse a request body as JSON.
///
/// Returns `415 Unsupported Media Type` when the content type is not JSON and
/// `400 Bad Request` when the body does not parse.
pub fn request_json(content_type: Option<&str>, body: &[u8]) -> Result<Value, StatusCode> {
    if !is_json(content_type) {
        return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
    serde_json::from_slice(body).map_err(|_| StatusCode::BAD_REQUEST)
}
