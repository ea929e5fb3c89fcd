//! Normalization of the envelopes the host hands back from template calls.
//!
//! Depending on the host version a response arrives as a raw JSON string, as
//! an object carrying the JSON text in its `response` field, or as an already
//! decoded payload. [`ResponseEnvelope::classify`] decides which one it is
//! before anything is parsed.

use serde_json::Value;

/// The shape of a host response, in decoding precedence order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseEnvelope<'a> {
    /// Null, `false`, `0` or an empty string.
    Empty,
    /// A JSON document delivered as a string.
    Text(&'a str),
    /// An object whose `response` field holds the JSON document.
    Wrapped(&'a str),
    /// An already decoded payload.
    Payload(&'a Value),
}

impl<'a> ResponseEnvelope<'a> {
    pub fn classify(value: &'a Value) -> Self {
        if is_falsy(value) {
            return Self::Empty;
        }
        if let Value::String(text) = value {
            return Self::Text(text);
        }
        match value.get("response") {
            Some(Value::String(inner)) if !inner.is_empty() => Self::Wrapped(inner),
            _ => Self::Payload(value),
        }
    }

    /// Decode the envelope. Returns `None` for empty input, undecodable JSON,
    /// or a document that decodes to `null`.
    pub fn decode(self) -> Option<Value> {
        let decoded = match self {
            Self::Empty => return None,
            Self::Text(text) | Self::Wrapped(text) => match serde_json::from_str(text) {
                Ok(value) => value,
                Err(err) => {
                    tracing::debug!(error = %err, "Discarding undecodable response body");
                    return None;
                }
            },
            Self::Payload(value) => value.clone(),
        };

        if decoded.is_null() {
            None
        } else {
            Some(decoded)
        }
    }
}

/// Decode a host response into its payload, or `None` if there is nothing
/// usable in it.
pub fn parse_response(value: &Value) -> Option<Value> {
    ResponseEnvelope::classify(value).decode()
}

/// JavaScript-style truthiness, which is what the host uses to signal "no
/// value" in its envelopes.
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
