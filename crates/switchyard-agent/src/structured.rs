//! Structured-output parsing for agent replies.
//!
//! The model is told to answer with a JSON instance of a schema; its reply is
//! then searched for that JSON. A reply that does not yield a valid instance is
//! a [`Parsed::Fallback`], never an error: callers decide what to do with it.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A record shape the agent can be asked to produce.
pub trait StructuredOutput: DeserializeOwned {
    /// Short type name, used in logs.
    fn name() -> &'static str;

    /// JSON Schema of the record.
    fn schema() -> Value;
}

/// Outcome of interpreting an agent reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Structured(T),
    /// The reply could not be read as `T`; `raw` is the reply unchanged.
    Fallback { raw: String, reason: String },
}

impl<T> Parsed<T> {
    pub fn is_structured(&self) -> bool {
        matches!(self, Parsed::Structured(_))
    }
}

/// Instructions appended to a system prompt asking for a `T`.
pub fn format_instructions<T: StructuredOutput>() -> String {
    let schema = serde_json::to_string(&T::schema()).unwrap_or_else(|_| "{}".to_string());
    format!(
        "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\n\
         As an example, for the schema {{\"properties\": {{\"foo\": {{\"title\": \"Foo\", \"description\": \"a list of strings\", \"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"foo\"]}}\n\
         the object {{\"foo\": [\"bar\", \"baz\"]}} is a well-formatted instance of the schema. \
         The object {{\"properties\": {{\"foo\": [\"bar\", \"baz\"]}}}} is not well-formatted.\n\n\
         Here is the output schema:\n```\n{}\n```",
        schema
    )
}

/// Reads a `T` out of `text`.
pub fn parse<T: StructuredOutput>(text: &str) -> Parsed<T> {
    let Some(value) = extract_json(text) else {
        return Parsed::Fallback {
            raw: text.to_string(),
            reason: format!("no JSON object found for {}", T::name()),
        };
    };

    match serde_json::from_value::<T>(value) {
        Ok(parsed) => Parsed::Structured(parsed),
        Err(e) => Parsed::Fallback {
            raw: text.to_string(),
            reason: format!("invalid {}: {}", T::name(), e),
        },
    }
}

/// Finds the JSON document in a model reply.
///
/// Tries, in order: the whole reply, the first fenced code block, and the
/// span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}

/// Body of the first ``` block, skipping an optional language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```").unwrap_or(body.len());
    Some(&body[..close])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl StructuredOutput for Point {
        fn name() -> &'static str {
            "Point"
        }
        fn schema() -> Value {
            json!({
                "properties": {"x": {"type": "integer"}, "y": {"type": "integer"}},
                "required": ["x", "y"]
            })
        }
    }

    #[test]
    fn bare_json() {
        assert_eq!(parse::<Point>(r#" {"x": 1, "y": 2} "#), Parsed::Structured(Point { x: 1, y: 2 }));
    }

    #[test]
    fn fenced_json_with_prose() {
        let reply = "Here you go:\n```json\n{\"x\": 3, \"y\": 4}\n```\nAnything else?";
        assert_eq!(parse::<Point>(reply), Parsed::Structured(Point { x: 3, y: 4 }));
    }

    #[test]
    fn embedded_object_without_fence() {
        let reply = "The answer is {\"x\": 5, \"y\": 6} as requested.";
        assert_eq!(parse::<Point>(reply), Parsed::Structured(Point { x: 5, y: 6 }));
    }

    #[test]
    fn prose_only_falls_back() {
        match parse::<Point>("I could not find anything.") {
            Parsed::Fallback { raw, reason } => {
                assert_eq!(raw, "I could not find anything.");
                assert!(reason.contains("Point"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn wrong_shape_falls_back() {
        let parsed = parse::<Point>(r#"{"x": "one"}"#);
        assert!(!parsed.is_structured());
    }

    #[test]
    fn instructions_embed_schema() {
        let instructions = format_instructions::<Point>();
        assert!(instructions.contains(r#""required":["x","y"]"#));
        assert!(instructions.starts_with("The output should be formatted as a JSON instance"));
    }
}
