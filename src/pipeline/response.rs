//! Failure-body decoding: pull a human-readable reason out of an error response.
//!
//! The conversion service answers failures with a small JSON object. Its own
//! errors use `{"error": "..."}`; framework-level rejections (validation,
//! missing field) use `{"detail": "..."}`. `detail` is preferred when both are
//! present. Anything else (empty body, HTML error page, non-string fields)
//! yields no reason and the caller falls back to a generic message.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Extract the failure reason from a response body, if one is decodable.
pub fn failure_reason(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    text_field(parsed.detail).or_else(|| text_field(parsed.error))
}

fn text_field(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_field() {
        assert_eq!(
            failure_reason(br#"{"detail":"bad format"}"#).as_deref(),
            Some("bad format")
        );
    }

    #[test]
    fn error_field() {
        assert_eq!(
            failure_reason(br#"{"error":"LibreOffice conversion failed: boom"}"#).as_deref(),
            Some("LibreOffice conversion failed: boom")
        );
    }

    #[test]
    fn detail_preferred_over_error() {
        assert_eq!(
            failure_reason(br#"{"error":"second","detail":"first"}"#).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn empty_detail_falls_through_to_error() {
        assert_eq!(
            failure_reason(br#"{"detail":"","error":"used"}"#).as_deref(),
            Some("used")
        );
    }

    #[test]
    fn undecodable_bodies_have_no_reason() {
        assert_eq!(failure_reason(b""), None);
        assert_eq!(failure_reason(b"<html>502 Bad Gateway</html>"), None);
        assert_eq!(failure_reason(br#"["detail"]"#), None);
        assert_eq!(failure_reason(br#"{"message":"other"}"#), None);
        assert_eq!(failure_reason(br#"{"detail":[{"msg":"field required"}]}"#), None);
        assert_eq!(failure_reason(br#"{"detail":null,"error":42}"#), None);
    }
}
