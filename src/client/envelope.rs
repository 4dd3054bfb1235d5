//! Response envelope normalization.
//!
//! The monitoring API wraps payloads inconsistently: some endpoints answer
//! `{"data": payload}`, others return the payload directly. Tokens come back
//! in three shapes. These rules are applied once, at the client boundary.

use serde_json::Value;

/// Parse a response body. Empty bodies become `null`; bodies that are not
/// JSON are kept as a JSON string.
pub fn parse_body(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Unwrap one level of `data` nesting if present.
///
/// An object with a non-null `data` key yields that value; anything else is
/// returned unchanged.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(inner) if !inner.is_null() => inner,
            Some(inner) => {
                map.insert("data".to_string(), inner);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Extract a bearer token from `{data: {token}}`, `{token}` or a bare
/// string, in that order.
pub fn extract_token(body: &Value) -> Option<String> {
    let candidate = body
        .get("data")
        .and_then(|data| data.get("token"))
        .and_then(Value::as_str)
        .or_else(|| body.get("token").and_then(Value::as_str))
        .or_else(|| body.as_str());

    candidate
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_nested_data() {
        assert_eq!(unwrap_envelope(json!({"data": [1, 2, 3]})), json!([1, 2, 3]));
        assert_eq!(
            unwrap_envelope(json!({"success": true, "data": {"uptime": "x"}})),
            json!({"uptime": "x"})
        );
    }

    #[test]
    fn test_unwrap_without_data_key_keeps_body() {
        assert_eq!(
            unwrap_envelope(json!({"result": "x"})),
            json!({"result": "x"})
        );
        assert_eq!(unwrap_envelope(json!([4, 5])), json!([4, 5]));
        assert_eq!(unwrap_envelope(Value::Null), Value::Null);
    }

    #[test]
    fn test_unwrap_only_one_level() {
        assert_eq!(
            unwrap_envelope(json!({"data": {"data": 1}})),
            json!({"data": 1})
        );
    }

    #[test]
    fn test_null_data_is_not_unwrapped() {
        assert_eq!(
            unwrap_envelope(json!({"data": null, "count": 0})),
            json!({"data": null, "count": 0})
        );
    }

    #[test]
    fn test_token_shapes_agree() {
        let shapes = [
            json!({"data": {"token": "abc.def"}}),
            json!({"token": "abc.def"}),
            json!("abc.def"),
        ];

        for shape in &shapes {
            assert_eq!(extract_token(shape).as_deref(), Some("abc.def"), "{}", shape);
        }
    }

    #[test]
    fn test_no_token() {
        assert_eq!(extract_token(&json!({"message": "ok"})), None);
        assert_eq!(extract_token(&json!({"token": 42})), None);
        assert_eq!(extract_token(&json!({"data": {"user": "admin"}})), None);
        assert_eq!(extract_token(&json!("")), None);
        assert_eq!(extract_token(&Value::Null), None);
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("  \n"), Value::Null);
        assert_eq!(parse_body(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body("plain-token\n"), json!("plain-token"));
        assert_eq!(parse_body(r#""quoted""#), json!("quoted"));
    }
}
