//! Backend tasks: identifiers, status snapshots and the poller that watches
//! them to completion.

mod poller;

pub use poller::{
    MALFORMED_STATUS_MESSAGE, PollObserver, PollOutcome, PollSession, TASK_FAILED_MESSAGE,
    TaskPoller,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::parse_response;

/// Opaque identifier of a backend task. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() { None } else { Some(Self(id)) }
    }

    /// Extract the `task_id` from the response of a start call.
    pub fn from_start_response(response: &Value) -> Option<Self> {
        let payload = parse_response(response)?;
        match payload.get("task_id")? {
            Value::String(id) => Self::new(id.as_str()),
            Value::Number(n) => Self::new(n.to_string()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Any status this client does not know; treated as still in progress.
    #[default]
    #[serde(other)]
    Other,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One observation of a task, as returned by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusSnapshot {
    #[serde(default)]
    pub status: TaskStatus,
    /// Cumulative text produced so far, not a delta.
    #[serde(default)]
    pub partial_result: Option<String>,
    #[serde(default)]
    pub final_result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TaskStatusSnapshot {
    /// Decode a status response. `None` means the response was empty or
    /// not a snapshot at all.
    pub fn decode(response: &Value) -> Option<Self> {
        let payload = parse_response(response)?;
        match serde_json::from_value(payload) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::debug!(error = %err, "Status response is not a task snapshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_id_comes_from_wrapped_start_response() {
        let response = json!({ "response": "{\"task_id\":\"t1\"}" });
        assert_eq!(TaskId::from_start_response(&response), TaskId::new("t1"));
    }

    #[test]
    fn numeric_task_ids_are_accepted() {
        let response = json!({ "task_id": 17 });
        assert_eq!(
            TaskId::from_start_response(&response).map(|id| id.to_string()),
            Some("17".to_string())
        );
    }

    #[test]
    fn missing_or_empty_task_id_is_rejected() {
        assert_eq!(TaskId::from_start_response(&json!({})), None);
        assert_eq!(TaskId::from_start_response(&json!({ "task_id": "" })), None);
        assert_eq!(TaskId::from_start_response(&json!({ "task_id": null })), None);
        assert_eq!(TaskId::from_start_response(&Value::Null), None);
    }

    #[test]
    fn unknown_status_decodes_as_other() {
        let snapshot = TaskStatusSnapshot::decode(&json!({ "status": "queued" })).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Other);
        assert!(!snapshot.status.is_terminal());

        let snapshot = TaskStatusSnapshot::decode(&json!({ "partial_result": "Hi" })).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Other);
        assert_eq!(snapshot.partial_result.as_deref(), Some("Hi"));
    }

    #[test]
    fn non_object_payload_is_not_a_snapshot() {
        assert_eq!(TaskStatusSnapshot::decode(&json!("[1,2]")), None);
        assert_eq!(TaskStatusSnapshot::decode(&json!({ "response": "garbage" })), None);
    }
}
