//! Terminal renderings of the chat and reply-helper views.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use desk_assist_core::view::{AnswerMessage, ChatView, ReplyTask, ReplyView};

/// Turns cumulative partial results into appendable output.
#[derive(Debug, Default)]
struct StreamPrinter {
    shown: String,
}

impl StreamPrinter {
    /// Text to print so the terminal shows `text`. When the backend revised
    /// earlier output, the full text is printed again on a new line.
    fn update(&mut self, text: &str) -> String {
        let out = match text.strip_prefix(self.shown.as_str()) {
            Some(rest) => rest.to_string(),
            None => format!("\n{text}"),
        };
        self.shown = text.to_string();
        out
    }

    /// Text to print so the terminal ends with the final `text`.
    fn finish(&mut self, text: &str) -> String {
        let out = if self.shown.is_empty() {
            format!("{text}\n")
        } else if self.shown == text {
            "\n".to_string()
        } else {
            let rest = self.update(text);
            format!("{rest}\n")
        };
        self.shown.clear();
        out
    }

    fn reset(&mut self) -> bool {
        let was_streaming = !self.shown.is_empty();
        self.shown.clear();
        was_streaming
    }
}

#[derive(Debug, Default)]
pub struct TerminalView {
    stream: Mutex<StreamPrinter>,
    last_result: Mutex<Option<String>>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last draft or summary shown, if any.
    pub fn take_result(&self) -> Option<String> {
        lock(&self.last_result).take()
    }

    fn stream(&self) -> MutexGuard<'_, StreamPrinter> {
        lock(&self.stream)
    }

    fn write(&self, text: &str) {
        let mut stdout = io::stdout();
        if let Err(err) = write!(stdout, "{text}").and_then(|()| stdout.flush()) {
            tracing::debug!(error = %err, "Failed to write to stdout");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChatView for TerminalView {
    fn render_user_message(&self, text: &str) {
        self.write(&format!("> {text}\n"));
    }

    fn set_loading(&self, loading: bool) {
        if loading {
            self.write("Thinking...\n");
        }
    }

    fn show_partial_answer(&self, text: &str) {
        let out = self.stream().update(text);
        self.write(&out);
    }

    fn render_answer(&self, message: &AnswerMessage) {
        let out = self.stream().finish(&message.answer);
        self.write(&out);

        if let Some(conversation_id) = message
            .metadata
            .conversation_id
            .as_deref()
            .filter(|_| message.metadata.is_rateable())
        {
            let sources: String = message
                .metadata
                .source_ticket_ids
                .iter()
                .map(|id| format!(" --source-ticket {id}"))
                .collect();
            self.write(&format!(
                "(rate this answer: desk-assist rate {conversation_id} <1-5>{sources})\n"
            ));
        }
    }

    fn render_error(&self, message: &str) {
        let prefix = if self.stream().reset() { "\n" } else { "" };
        self.write(&format!("{prefix}{message}\n"));
    }
}

impl ReplyView for TerminalView {
    fn show_loading(&self, task: ReplyTask) {
        self.write(&format!("{task}\n"));
    }

    fn show_partial(&self, _task: ReplyTask, text: &str) {
        let out = self.stream().update(text);
        self.write(&out);
    }

    fn show_draft(&self, draft: &str) {
        let out = self.stream().finish(draft);
        self.write(&out);
        *lock(&self.last_result) = Some(draft.to_string());
    }

    fn show_summary(&self, summary: &str) {
        let out = self.stream().finish(summary);
        self.write(&out);
        *lock(&self.last_result) = Some(summary.to_string());
    }

    fn show_initial(&self) {
        if self.stream().reset() {
            self.write("\n");
        }
    }
}
