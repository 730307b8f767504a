use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Error kinds carried by a failed [`ApiResult`].
///
/// The first six are produced locally; anything else is a string the remote
/// service sent and is passed through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorKind {
    RateLimit,
    ConnectionError,
    UnknownError,
    MemberNotFound,
    PermissionDenied,
    Usage,
    Remote(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::UnknownError => "unknown_error",
            ErrorKind::MemberNotFound => "member_not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Usage => "usage",
            ErrorKind::Remote(s) => s,
        }
    }
}

impl From<String> for ErrorKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "rate_limit" => ErrorKind::RateLimit,
            "connection_error" => ErrorKind::ConnectionError,
            "unknown_error" => ErrorKind::UnknownError,
            "member_not_found" => ErrorKind::MemberNotFound,
            "permission_denied" => ErrorKind::PermissionDenied,
            "usage" => ErrorKind::Usage,
            _ => ErrorKind::Remote(s),
        }
    }
}

impl From<ErrorKind> for String {
    fn from(k: ErrorKind) -> Self {
        match k {
            ErrorKind::Remote(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform result envelope returned by every client operation.
///
/// `extra` keeps every endpoint-specific field the remote service sent
/// (`members`, `matches`, `member`, ...) so unknown fields survive a round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub success: bool,
    #[serde(
        default,
        deserialize_with = "lenient_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<ErrorKind>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(kind),
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_kind(&self) -> Option<&ErrorKind> {
        self.error.as_ref()
    }

    /// Raw endpoint-specific field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Endpoint-specific field decoded into a typed view.
    ///
    /// Returns `None` when the field is absent or does not match `T`.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let v = self.extra.get(key)?;
        serde_json::from_value(v.clone()).ok()
    }

    /// Human-readable message, falling back to the error kind.
    pub fn display_message(&self) -> String {
        if let Some(m) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return m.to_string();
        }
        match &self.error {
            Some(kind) => format!("Request failed ({kind})"),
            None if self.success => "Done.".to_string(),
            None => "Request failed.".to_string(),
        }
    }

    /// Decode a parsed JSON body into an envelope.
    ///
    /// Only JSON objects qualify; a missing `success` reads as `false`.
    pub fn from_body(body: Value) -> std::result::Result<Self, String> {
        match body {
            Value::Object(_) => serde_json::from_value(body).map_err(|e| e.to_string()),
            other => Err(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )),
        }
    }

    /// Rate-limit envelope with the response body merged in.
    ///
    /// `success`/`error` stay fixed; a body `message` replaces the default text.
    pub fn rate_limited(body: Option<Map<String, Value>>) -> Self {
        let mut out = Self::failure(
            ErrorKind::RateLimit,
            "Rate limit exceeded. Please wait a moment and try again.",
        );

        for (k, v) in body.unwrap_or_default() {
            match k.as_str() {
                "success" | "error" => {}
                "message" => {
                    if let Value::String(m) = v {
                        out.message = Some(m);
                    }
                }
                _ => {
                    out.extra.insert(k, v);
                }
            }
        }

        out
    }
}

// Non-string values are kept as their JSON text.
fn lenient_kind<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ErrorKind>, D::Error> {
    Ok(lenient_text(d)?.map(ErrorKind::from))
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// `1`, `"true"` and `"1"` count as set; anything unrecognized is unset.
fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    })
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passes_through_unknown_fields_and_errors() {
        let body = json!({
            "success": false,
            "error": "invalid_rank",
            "message": "Rank 'Admiral' does not exist",
            "valid_ranks": ["Aspirant", "Novice"]
        });
        let r = ApiResult::from_body(body.clone()).unwrap();
        assert!(!r.success);
        assert_eq!(r.error, Some(ErrorKind::Remote("invalid_rank".to_string())));
        assert_eq!(r.get("valid_ranks"), Some(&json!(["Aspirant", "Novice"])));
        assert_eq!(serde_json::to_value(&r).unwrap(), body);
    }

    #[test]
    fn missing_success_reads_as_failure() {
        let r = ApiResult::from_body(json!({"status": "ok"})).unwrap();
        assert!(!r.success);
        assert_eq!(r.get("status"), Some(&json!("ok")));
    }

    #[test]
    fn structured_error_fields_do_not_break_decoding() {
        let r = ApiResult::from_body(json!({
            "success": false,
            "error": {"code": 17},
            "message": null
        }))
        .unwrap();
        assert_eq!(r.error, Some(ErrorKind::Remote(r#"{"code":17}"#.to_string())));
        assert_eq!(r.message, None);
    }

    #[test]
    fn loose_success_flags_keep_the_body() {
        for (flag, expected) in [
            (json!(1), true),
            (json!("true"), true),
            (json!("1"), true),
            (json!(0), false),
            (json!("false"), false),
            (json!(null), false),
        ] {
            let r = ApiResult::from_body(json!({"success": flag, "members": []})).unwrap();
            assert_eq!(r.success, expected, "flag {flag}");
            assert_eq!(r.get("members"), Some(&json!([])));
        }
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        let err = ApiResult::from_body(json!([1, 2])).unwrap_err();
        assert!(err.contains("an array"));
    }

    #[test]
    fn rate_limit_keeps_kind_and_merges_body() {
        let mut body = Map::new();
        body.insert("error".to_string(), json!("too_many_requests"));
        body.insert("retry_after".to_string(), json!(30));
        body.insert("success".to_string(), json!(true));
        let r = ApiResult::rate_limited(Some(body));
        assert!(!r.success);
        assert_eq!(r.error, Some(ErrorKind::RateLimit));
        assert_eq!(r.get("retry_after"), Some(&json!(30)));
        assert!(r.display_message().starts_with("Rate limit exceeded"));
    }

    #[test]
    fn local_kinds_serialize_as_snake_case_strings() {
        let r = ApiResult::failure(ErrorKind::MemberNotFound, "nope");
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            json!({"success": false, "error": "member_not_found", "message": "nope"})
        );
    }
}
