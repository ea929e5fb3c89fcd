use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ActiveSession, FlowServices, StreamTarget, StreamingObserver};
use crate::error::{Error, Result};
use crate::history::{ChatHistory, ChatTurn};
use crate::host::Notifier;
use crate::task::{PollSession, TaskId};
use crate::view::{AnswerMessage, AnswerMetadata, ChatView};

pub const NO_VALID_ANSWER_MESSAGE: &str = "No valid response received from the assistant.";

/// A question typed into the chat panel.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    /// Product areas to restrict the search to. Empty searches everything.
    pub product_types: Vec<String>,
    /// Send the open ticket's conversation along with the question.
    pub use_ticket_context: bool,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
struct QueryPayload<'a> {
    user_query: &'a str,
    chat_history: &'a [ChatTurn],
    product_types_to_search: &'a [String],
    ticket_conversation_context: String,
}

#[derive(Deserialize)]
struct AnswerPayload {
    #[serde(default)]
    answer: Option<String>,
    #[serde(flatten)]
    metadata: AnswerMetadata,
}

impl AnswerPayload {
    fn decode(result: Value) -> Option<AnswerMessage> {
        let payload = match result {
            Value::String(answer) => AnswerPayload {
                answer: Some(answer),
                metadata: AnswerMetadata::default(),
            },
            other => serde_json::from_value(other).ok()?,
        };
        let answer = payload.answer.filter(|a| !a.trim().is_empty())?;
        Some(AnswerMessage {
            answer,
            metadata: payload.metadata,
        })
    }
}

/// The chat panel flow: ask a question, stream the answer, remember the turn.
pub struct QueryFlow {
    services: FlowServices,
    view: Arc<dyn ChatView>,
    history: Arc<Mutex<ChatHistory>>,
    active: ActiveSession,
}

impl QueryFlow {
    pub fn new(services: FlowServices, view: Arc<dyn ChatView>) -> Self {
        Self {
            services,
            view,
            history: Arc::new(Mutex::new(ChatHistory::new())),
            active: ActiveSession::default(),
        }
    }

    pub fn history(&self) -> Arc<Mutex<ChatHistory>> {
        self.history.clone()
    }

    /// Submit a question and start streaming its answer.
    ///
    /// Any earlier submission is cancelled first, even one still waiting on
    /// its start call; that one returns [`Error::Superseded`] without
    /// rendering anything further. Start failures are rendered and notified
    /// before being returned.
    pub async fn submit(&self, request: QueryRequest) -> Result<PollSession> {
        let question = request.query.trim().to_string();
        if question.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let token = self.active.begin().await;
        self.view.render_user_message(&question);
        self.view.set_loading(true);

        let started = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("Query superseded before its task started");
                return Err(Error::Superseded);
            }
            started = self.start(&question, &request) => started,
        };
        let task_id = match started {
            Ok(task_id) => task_id,
            Err(err) => {
                let message = err.display_message();
                warn!(error = %message, "Could not start query");
                self.view.set_loading(false);
                self.view.render_error(&format!("Error: {message}"));
                self.services.notifier.danger(&message).await;
                return Err(err);
            }
        };

        info!(%task_id, "Query submitted");
        let target = QueryTarget {
            view: self.view.clone(),
            history: self.history.clone(),
            notifier: self.services.notifier.clone(),
            question,
            loading: true,
        };
        Ok(self
            .services
            .poller
            .spawn_with_token(task_id, StreamingObserver::new(target), token))
    }

    /// Stop the running session, if any. Nothing further is rendered for it.
    pub async fn cancel(&self) {
        self.active.cancel().await;
    }

    async fn start(&self, question: &str, request: &QueryRequest) -> Result<TaskId> {
        let context = if request.use_ticket_context {
            self.services.context.build().await
        } else {
            String::new()
        };

        let recent = self
            .history
            .lock()
            .await
            .recent(self.services.history_window)
            .to_vec();
        let payload = QueryPayload {
            user_query: question,
            chat_history: &recent,
            product_types_to_search: &request.product_types,
            ticket_conversation_context: context,
        };

        self.services
            .start_task(&self.services.templates.start_query, &payload)
            .await
    }
}

struct QueryTarget {
    view: Arc<dyn ChatView>,
    history: Arc<Mutex<ChatHistory>>,
    notifier: Notifier,
    question: String,
    loading: bool,
}

impl QueryTarget {
    fn stop_loading(&mut self) {
        if self.loading {
            self.loading = false;
            self.view.set_loading(false);
        }
    }
}

#[async_trait]
impl StreamTarget for QueryTarget {
    fn begin_streaming(&mut self) {
        self.stop_loading();
    }

    fn show_partial(&mut self, text: &str) {
        self.view.show_partial_answer(text);
    }

    async fn complete(&mut self, result: Value) {
        let Some(message) = AnswerPayload::decode(result) else {
            self.fail(NO_VALID_ANSWER_MESSAGE.to_string()).await;
            return;
        };

        self.stop_loading();
        self.view.render_answer(&message);
        let recorded = self
            .history
            .lock()
            .await
            .record(&self.question, &message.answer);
        info!(
            conversation_id = message.metadata.conversation_id.as_deref().unwrap_or(""),
            recorded, "Answer received"
        );
    }

    async fn fail(&mut self, message: String) {
        warn!(error = %message, "Query failed");
        self.stop_loading();
        self.view.render_error(&format!("Error: {message}"));
        self.notifier.danger(&message).await;
    }
}
