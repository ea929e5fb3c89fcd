//! The surface of the helpdesk host this crate runs against.
//!
//! Ticket data, templated backend requests, notifications and editor
//! insertion are all owned by the host; request signing happens there too.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use crate::error_message::error_message;

/// Error raised by the host while serving a request.
///
/// Mirrors what the host reports: an optional transport message, the raw
/// response body and the HTTP status when one was received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostError {
    pub message: Option<String>,
    pub response: Option<String>,
    pub status: Option<u16>,
}

impl HostError {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_response(status: u16, body: impl Into<String>) -> Self {
        Self {
            message: Some(format!("Request failed with status {status}")),
            response: Some(body.into()),
            status: Some(status),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(message) = &self.message {
            map.insert("message".to_string(), Value::String(message.clone()));
        }
        if let Some(response) = &self.response {
            map.insert("response".to_string(), Value::String(response.clone()));
        }
        if let Some(status) = self.status {
            map.insert("status".to_string(), Value::from(status));
        }
        Value::Object(map)
    }

    pub fn display_message(&self) -> String {
        error_message(Some(&self.to_value()))
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_message())
    }
}

impl std::error::Error for HostError {}

/// Arguments for a templated request: path/query placeholders go in
/// `context`, the JSON payload in `body`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl TemplateRequest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_context(context: Value) -> Self {
        Self {
            context: Some(context),
            body: None,
        }
    }

    pub fn with_body(body: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            context: None,
            body: Some(serde_json::to_value(body)?),
        })
    }

    /// Look up a context placeholder as a string.
    pub fn context_str(&self, key: &str) -> Option<String> {
        match self.context.as_ref()?.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TicketId {
    Number(u64),
    Text(String),
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketId::Number(n) => write!(f, "{n}"),
            TicketId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketData {
    #[serde(default)]
    pub id: Option<TicketId>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
}

impl TicketData {
    /// The product area recorded on the ticket, if any.
    pub fn product_type(&self) -> Option<&str> {
        self.custom_fields
            .get("application")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotifyKind {
    Info,
    Success,
    Warning,
    Danger,
}

/// Text to place into the host's reply editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorInsert {
    pub text: String,
    /// Insert as a private note instead of a public reply.
    pub as_note: bool,
}

impl EditorInsert {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            as_note: false,
        }
    }

    pub fn note(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            as_note: true,
        }
    }
}

#[async_trait]
pub trait HostSdk: Send + Sync {
    /// Invoke a named request template configured in the host.
    async fn invoke_template(
        &self,
        template: &str,
        request: TemplateRequest,
    ) -> Result<Value, HostError>;

    /// The ticket currently open in the host.
    async fn ticket(&self) -> Result<TicketData, HostError>;

    async fn notify(&self, kind: NotifyKind, message: &str) -> Result<(), HostError>;

    async fn set_editor_value(&self, insert: EditorInsert) -> Result<(), HostError>;
}

/// Fire-and-forget notifications: failures are logged, never returned.
#[derive(Clone)]
pub struct Notifier {
    host: Arc<dyn HostSdk>,
}

impl Notifier {
    pub fn new(host: Arc<dyn HostSdk>) -> Self {
        Self { host }
    }

    pub async fn send(&self, kind: NotifyKind, message: &str) {
        if let Err(err) = self.host.notify(kind, message).await {
            tracing::warn!(%kind, error = %err, "Failed to show notification");
        }
    }

    pub async fn info(&self, message: &str) {
        self.send(NotifyKind::Info, message).await;
    }

    pub async fn success(&self, message: &str) {
        self.send(NotifyKind::Success, message).await;
    }

    pub async fn danger(&self, message: &str) {
        self.send(NotifyKind::Danger, message).await;
    }
}
