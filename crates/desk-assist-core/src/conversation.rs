use serde::{Deserialize, Serialize};

pub const CONVERSATION_HEADER: &str = "Current Ticket Conversation:\n---\n";
const NO_CONTENT: &str = "No content";

/// One message from a ticket's conversation thread, as the host returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub incoming: bool,
    #[serde(default)]
    pub body_text: Option<String>,
}

impl ConversationEntry {
    pub fn author_label(&self) -> &'static str {
        if self.private {
            "Support Agent (Internal Note):"
        } else if self.incoming {
            "Customer:"
        } else {
            "Support Agent:"
        }
    }

    fn body(&self) -> &str {
        match self.body_text.as_deref() {
            Some(text) if !text.is_empty() => text.trim(),
            _ => NO_CONTENT,
        }
    }
}

/// Render a conversation thread into the context block sent to the backend.
pub fn format_conversations(entries: &[ConversationEntry]) -> String {
    let blocks = entries
        .iter()
        .map(|entry| format!("{}\n{}\n---", entry.author_label(), entry.body()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{CONVERSATION_HEADER}{blocks}")
}
