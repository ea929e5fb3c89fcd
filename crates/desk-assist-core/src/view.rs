//! Rendering surfaces driven by the flows.
//!
//! Implementations may be called after the surface they draw on has been
//! closed; they are expected to ignore such calls rather than fail.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::host::TicketId;

/// What a rating needs to point back at the answer it rates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub source_ticket_ids: Vec<TicketId>,
}

impl AnswerMetadata {
    /// Ratings can only be stored for answers the backend recorded.
    pub fn is_rateable(&self) -> bool {
        self.conversation_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerMessage {
    pub answer: String,
    pub metadata: AnswerMetadata,
}

/// The modal chat panel.
pub trait ChatView: Send + Sync {
    fn render_user_message(&self, text: &str);

    fn set_loading(&self, loading: bool);

    /// Replace the streaming answer with `text`.
    fn show_partial_answer(&self, text: &str);

    fn render_answer(&self, message: &AnswerMessage);

    fn render_error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReplyTask {
    #[strum(serialize = "Drafting reply...")]
    Draft,
    #[strum(serialize = "Summarizing...")]
    Summary,
}

/// The reply-helper sidebar.
pub trait ReplyView: Send + Sync {
    fn show_loading(&self, task: ReplyTask);

    /// Replace the streaming text with `text`, leaving the loading state.
    fn show_partial(&self, task: ReplyTask, text: &str);

    fn show_draft(&self, draft: &str);

    fn show_summary(&self, summary: &str);

    /// Return to the view shown before anything was requested.
    fn show_initial(&self);
}
