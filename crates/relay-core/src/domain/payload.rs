//! Payload codec for values that cross the context boundary as text.
//!
//! Decoding never fails: anything that is not well-formed JSON is handed back
//! as raw text, and bytes that are not even text come back as `Empty`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::CodecError;

/// Result of decoding one boundary payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Well-formed JSON.
    Value(Value),
    /// Text that did not parse as JSON, returned unchanged.
    RawText(String),
    /// Not text at all.
    Empty,
}

impl Decoded {
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::Value(value),
            Err(_) => Self::RawText(text.to_string()),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return Self::Value(value);
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::RawText(text.to_string()),
            Err(_) => Self::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Value(Value::String(text)) | Self::RawText(text) => Some(text),
            _ => None,
        }
    }

    /// Collapse into a JSON value: raw text becomes a string, `Empty` null.
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::RawText(text) => Value::String(text),
            Self::Empty => Value::Null,
        }
    }

    /// Deserialize into `T`, treating raw text as a JSON string.
    pub fn decode_as<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Self::Value(value) => serde_json::from_value(value.clone()).ok(),
            Self::RawText(text) => serde_json::from_value(Value::String(text.clone())).ok(),
            Self::Empty => None,
        }
    }
}

impl From<Value> for Decoded {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Serialize a value for transport.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::object(r#"{"done":true}"#, json!({"done": true}))]
    #[case::number("5", json!(5))]
    #[case::quoted_string(r#""hi""#, json!("hi"))]
    #[case::null("null", Value::Null)]
    fn json_text_decodes_to_value(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(Decoded::from_text(text), Decoded::Value(expected));
    }

    #[rstest]
    #[case::plain_word("hello")]
    #[case::empty("")]
    #[case::broken_json("{not json")]
    fn non_json_text_is_returned_unchanged(#[case] text: &str) {
        assert_eq!(Decoded::from_text(text), Decoded::RawText(text.to_string()));
    }

    #[test]
    fn non_text_bytes_decode_to_empty() {
        let decoded = Decoded::from_bytes(&[0xff, 0xfe, 0x00]);
        assert!(decoded.is_empty());
        assert_eq!(decoded.into_value(), Value::Null);
    }

    #[test]
    fn bytes_follow_the_same_fallback_as_text() {
        assert_eq!(Decoded::from_bytes(b"[1,2]"), Decoded::Value(json!([1, 2])));
        assert_eq!(
            Decoded::from_bytes(b"plain"),
            Decoded::RawText("plain".to_string())
        );
    }

    #[test]
    fn raw_text_can_be_read_as_string() {
        let decoded = Decoded::from_text("x");
        assert_eq!(decoded.as_text(), Some("x"));
        assert_eq!(decoded.decode_as::<String>(), Some("x".to_string()));
        assert_eq!(decoded.into_value(), json!("x"));
    }

    #[test]
    fn decode_as_reads_structured_values() {
        let decoded = Decoded::from_text("[2,3]");
        assert_eq!(decoded.decode_as::<(i64, i64)>(), Some((2, 3)));
        assert_eq!(decoded.decode_as::<String>(), None);
    }

    #[test]
    fn encode_produces_json_text() {
        assert_eq!(encode(&json!({"a": [1, 2]})).unwrap(), r#"{"a":[1,2]}"#);
        assert_eq!(encode("x").unwrap(), r#""x""#);
    }
}
