use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::conversation::{ConversationEntry, format_conversations};
use crate::host::{HostError, HostSdk, TemplateRequest, TicketData, TicketId};
use crate::response::parse_response;

/// Builds the ticket context that accompanies a backend request.
///
/// Context is best effort: it never fails, it degrades. A full conversation
/// thread is preferred, then subject and description, then nothing.
#[derive(Clone)]
pub struct ContextBuilder {
    host: Arc<dyn HostSdk>,
    conversations_template: String,
}

impl ContextBuilder {
    pub fn new(host: Arc<dyn HostSdk>, conversations_template: impl Into<String>) -> Self {
        Self {
            host,
            conversations_template: conversations_template.into(),
        }
    }

    /// Context for the ticket currently open in the host.
    pub async fn build(&self) -> String {
        match self.host.ticket().await {
            Ok(ticket) => self.for_ticket(&ticket).await,
            Err(err) => {
                warn!(error = %err, "Could not read ticket data; sending query without context");
                String::new()
            }
        }
    }

    /// Context for an already fetched ticket.
    pub async fn for_ticket(&self, ticket: &TicketData) -> String {
        let Some(ticket_id) = &ticket.id else {
            debug!("Ticket has no id; sending query without context");
            return String::new();
        };

        match self.fetch_conversations(ticket_id).await {
            Ok(entries) if !entries.is_empty() => format_conversations(&entries),
            Ok(_) => {
                debug!(%ticket_id, "Ticket has no conversations; using subject and description");
                simple_context(ticket)
            }
            Err(err) => {
                warn!(%ticket_id, error = %err, "Failed to fetch ticket conversations, using fallback");
                simple_context(ticket)
            }
        }
    }

    async fn fetch_conversations(
        &self,
        ticket_id: &TicketId,
    ) -> Result<Vec<ConversationEntry>, HostError> {
        let response = self
            .host
            .invoke_template(
                &self.conversations_template,
                TemplateRequest::with_context(json!({ "ticket_id": ticket_id })),
            )
            .await?;

        let Some(payload) = parse_response(&response) else {
            return Ok(Vec::new());
        };

        serde_json::from_value(payload)
            .map_err(|e| HostError::message(format!("Unexpected conversations payload: {e}")))
    }
}

/// Context built only from the ticket's subject and description.
pub fn simple_context(ticket: &TicketData) -> String {
    format!(
        "Ticket Context:\nSubject: {}\nDescription: {}\n---",
        ticket.subject.as_deref().unwrap_or_default(),
        ticket.description_text.as_deref().unwrap_or_default()
    )
}
