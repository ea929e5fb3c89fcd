//! Moving generated text into the host's reply editor.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::host::{EditorInsert, HostSdk, Notifier};

pub const DRAFT_INSERTED_MESSAGE: &str = "Draft inserted into reply.";
pub const DRAFT_INSERT_FAILED_MESSAGE: &str = "Could not insert draft.";

/// Convert a plain-text draft to editor HTML.
///
/// Text that already contains markup is passed through untouched.
pub fn draft_to_editor_html(draft: &str) -> String {
    if contains_html_tag(draft) {
        return draft.to_string();
    }

    let normalized = draft.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| format!("<p>{}</p>", escape_html(paragraph).replace('\n', "<br>")))
        .collect()
}

fn contains_html_tag(text: &str) -> bool {
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let name = after.strip_prefix('/').unwrap_or(after);
        if name.starts_with(|c: char| c.is_ascii_alphabetic()) && after.contains('>') {
            return true;
        }
        rest = after;
    }
    false
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Actions offered on a finished draft or summary.
#[derive(Clone)]
pub struct ReplyActions {
    host: Arc<dyn HostSdk>,
    notifier: Notifier,
}

impl ReplyActions {
    pub fn new(host: Arc<dyn HostSdk>) -> Self {
        Self {
            notifier: Notifier::new(host.clone()),
            host,
        }
    }

    /// Put the draft into the public reply editor.
    pub async fn accept_draft(&self, draft: &str) -> Result<()> {
        let html = draft_to_editor_html(draft);
        match self.host.set_editor_value(EditorInsert::reply(html)).await {
            Ok(()) => {
                info!("Draft inserted into editor");
                self.notifier.success(DRAFT_INSERTED_MESSAGE).await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Failed to insert draft");
                self.notifier.danger(DRAFT_INSERT_FAILED_MESSAGE).await;
                Err(err.into())
            }
        }
    }

    /// Add the summary to the ticket as a private note, verbatim.
    pub async fn insert_summary(&self, summary: &str) -> Result<()> {
        if let Err(err) = self.host.set_editor_value(EditorInsert::note(summary)).await {
            warn!(error = %err, "Failed to insert summary");
            self.notifier
                .danger(&format!("Could not summarize: {}", err.display_message()))
                .await;
            return Err(err.into());
        }
        Ok(())
    }
}
