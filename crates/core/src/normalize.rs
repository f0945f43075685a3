//! Turns loosely-shaped inference responses into display text.
//!
//! Inference endpoints answer with either an object carrying `generated_text`
//! or a list of such objects, and occasionally with something else entirely
//! (an error object, a loading notice, an empty list). The response is decoded
//! into [`InferenceResponse`] and reduced to a string; anything unrecognized
//! becomes [`FALLBACK_TEXT`].

use serde_json::{Map, Value};

pub const GENERATED_TEXT_FIELD: &str = "generated_text";
pub const FALLBACK_TEXT: &str = "Sorry, I couldn't generate a valid response.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedText {
    pub generated_text: String,
}

impl GeneratedText {
    /// Only a JSON object with a string `generated_text` qualifies; arrays
    /// never stand in for objects.
    fn from_object(object: &Map<String, Value>) -> Option<Self> {
        object
            .get(GENERATED_TEXT_FIELD)
            .and_then(Value::as_str)
            .map(|text| Self { generated_text: text.to_owned() })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InferenceResponse {
    Object(GeneratedText),
    Sequence(Vec<Value>),
    Unrecognized(Value),
}

impl InferenceResponse {
    pub fn decode(value: Value) -> Self {
        match value {
            Value::Object(object) => match GeneratedText::from_object(&object) {
                Some(text) => Self::Object(text),
                None => Self::Unrecognized(Value::Object(object)),
            },
            Value::Array(items) => Self::Sequence(items),
            other => Self::Unrecognized(other),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Object(object) => object.generated_text,
            Self::Sequence(items) => items
                .first()
                .and_then(Value::as_object)
                .and_then(GeneratedText::from_object)
                .map(|object| object.generated_text)
                .unwrap_or_else(|| FALLBACK_TEXT.to_owned()),
            Self::Unrecognized(_) => FALLBACK_TEXT.to_owned(),
        }
    }
}

pub fn normalize(value: &Value) -> String {
    InferenceResponse::decode(value.clone()).into_text()
}

/// Same as [`normalize`] but starting from raw response bytes; bytes that are
/// not JSON at all also yield the fallback.
pub fn normalize_bytes(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => InferenceResponse::decode(value).into_text(),
        Err(_) => FALLBACK_TEXT.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize, normalize_bytes, InferenceResponse, FALLBACK_TEXT};

    #[test]
    fn object_with_generated_text_is_returned_unmodified() {
        let value = json!({ "generated_text": "  Hello there!\n", "score": 0.9 });
        assert_eq!(normalize(&value), "  Hello there!\n");
    }

    #[test]
    fn first_element_of_sequence_is_used() {
        let value = json!([{ "generated_text": "first" }, { "generated_text": "second" }]);
        assert_eq!(normalize(&value), "first");
    }

    #[test]
    fn sequence_whose_first_element_lacks_the_field_falls_back() {
        let value = json!([{ "text": "nope" }, { "generated_text": "second" }]);
        assert_eq!(normalize(&value), FALLBACK_TEXT);
    }

    #[test]
    fn malformed_and_empty_inputs_fall_back() {
        for value in [
            json!(null),
            json!({}),
            json!([]),
            json!("plain string"),
            json!(42),
            json!({ "error": "Model is currently loading" }),
            json!({ "generated_text": 17 }),
            json!([["nested"]]),
            json!([null]),
            json!(["hello"]),
            json!([["x"]]),
        ] {
            assert_eq!(normalize(&value), FALLBACK_TEXT, "input: {value}");
        }
    }

    #[test]
    fn undecodable_bytes_fall_back() {
        assert_eq!(normalize_bytes(b""), FALLBACK_TEXT);
        assert_eq!(normalize_bytes(b"<html>502</html>"), FALLBACK_TEXT);
        assert_eq!(normalize_bytes(br#"{"generated_text":"ok"}"#), "ok");
    }

    #[test]
    fn arrays_never_pass_for_objects() {
        assert_eq!(normalize(&json!(["hello"])), FALLBACK_TEXT);
        assert_eq!(normalize(&json!([["nested"]])), FALLBACK_TEXT);
        assert_eq!(normalize(&json!([["x", "y"], { "generated_text": "late" }])), FALLBACK_TEXT);
    }

    #[test]
    fn decode_classifies_shapes() {
        assert!(matches!(
            InferenceResponse::decode(json!({ "generated_text": "x" })),
            InferenceResponse::Object(_)
        ));
        assert!(matches!(InferenceResponse::decode(json!([])), InferenceResponse::Sequence(_)));
        assert!(matches!(
            InferenceResponse::decode(json!({ "other": 1 })),
            InferenceResponse::Unrecognized(_)
        ));
    }
}
