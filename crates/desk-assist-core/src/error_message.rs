use serde_json::Value;

use crate::response::is_falsy;

pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

/// Extract a human-readable message from an error-like JSON value.
///
/// Backend errors usually carry a JSON body in `response` with a `detail`
/// field, transport errors a `message`. Anything else is rendered as JSON.
/// An empty object carries no information and counts as missing.
pub fn error_message(error: Option<&Value>) -> String {
    let Some(error) = error.filter(|value| !is_falsy(value) && !is_empty_object(value)) else {
        return UNKNOWN_ERROR_MESSAGE.to_string();
    };

    let message = error
        .get("message")
        .filter(|value| !is_falsy(value))
        .map(render);

    if let Some(Value::String(body)) = error.get("response")
        && !body.is_empty()
        && let Ok(parsed) = serde_json::from_str::<Value>(body)
    {
        return parsed
            .get("detail")
            .filter(|value| !is_falsy(value))
            .map(render)
            .or(message)
            .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());
    }

    message.unwrap_or_else(|| error.to_string())
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(serde_json::Map::is_empty)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
