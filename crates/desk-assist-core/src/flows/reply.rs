use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ActiveSession, FlowServices, StreamTarget, StreamingObserver};
use crate::error::{Error, Result};
use crate::host::{Notifier, TicketId};
use crate::task::{PollSession, TaskId};
use crate::view::{ReplyTask, ReplyView};

impl ReplyTask {
    /// Field of the final result that carries the generated text.
    fn result_field(self) -> &'static str {
        match self {
            ReplyTask::Draft => "draft",
            ReplyTask::Summary => "summary",
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            ReplyTask::Draft => "Could not draft reply",
            ReplyTask::Summary => "Could not summarize",
        }
    }

    fn invalid_response_message(self) -> &'static str {
        match self {
            ReplyTask::Draft => "Invalid response from draft service.",
            ReplyTask::Summary => "Invalid response from summarize service.",
        }
    }
}

#[derive(Serialize)]
struct ReplyPayload<'a> {
    ticket_conversation_context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_type: Option<&'a str>,
    ticket_id: Option<&'a TicketId>,
}

/// The reply-helper flows: draft a reply to, or summarize, the open ticket.
pub struct ReplyFlow {
    task: ReplyTask,
    services: FlowServices,
    view: Arc<dyn ReplyView>,
    active: ActiveSession,
}

impl ReplyFlow {
    pub fn new(task: ReplyTask, services: FlowServices, view: Arc<dyn ReplyView>) -> Self {
        Self {
            task,
            services,
            view,
            active: ActiveSession::default(),
        }
    }

    pub fn draft(services: FlowServices, view: Arc<dyn ReplyView>) -> Self {
        Self::new(ReplyTask::Draft, services, view)
    }

    pub fn summarize(services: FlowServices, view: Arc<dyn ReplyView>) -> Self {
        Self::new(ReplyTask::Summary, services, view)
    }

    pub fn task(&self) -> ReplyTask {
        self.task
    }

    /// Start generating for the open ticket. Also used to regenerate.
    ///
    /// A submission superseded while its start call is in flight returns
    /// [`Error::Superseded`] and leaves the view to the newer one.
    pub async fn submit(&self) -> Result<PollSession> {
        let token = self.active.begin().await;
        self.view.show_loading(self.task);

        let started = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(task = ?self.task, "Reply task superseded before it started");
                return Err(Error::Superseded);
            }
            started = self.start() => started,
        };
        let task_id = match started {
            Ok(task_id) => task_id,
            Err(err) => {
                let message = err.display_message();
                warn!(task = ?self.task, error = %message, "Could not start reply task");
                self.services
                    .notifier
                    .danger(&format!("{}: {message}", self.task.failure_prefix()))
                    .await;
                self.view.show_initial();
                return Err(err);
            }
        };

        info!(task = ?self.task, %task_id, "Reply task submitted");
        let target = ReplyTarget {
            task: self.task,
            view: self.view.clone(),
            notifier: self.services.notifier.clone(),
        };
        Ok(self
            .services
            .poller
            .spawn_with_token(task_id, StreamingObserver::new(target), token))
    }

    pub async fn cancel(&self) {
        self.active.cancel().await;
    }

    async fn start(&self) -> Result<TaskId> {
        let ticket = self.services.host.ticket().await?;
        let context = self.services.context.for_ticket(&ticket).await;
        let payload = ReplyPayload {
            ticket_conversation_context: context,
            product_type: match self.task {
                ReplyTask::Draft => ticket.product_type(),
                ReplyTask::Summary => None,
            },
            ticket_id: ticket.id.as_ref(),
        };

        let template = match self.task {
            ReplyTask::Draft => &self.services.templates.start_draft,
            ReplyTask::Summary => &self.services.templates.start_summarize,
        };
        self.services.start_task(template, &payload).await
    }
}

struct ReplyTarget {
    task: ReplyTask,
    view: Arc<dyn ReplyView>,
    notifier: Notifier,
}

#[async_trait]
impl StreamTarget for ReplyTarget {
    fn begin_streaming(&mut self) {}

    fn show_partial(&mut self, text: &str) {
        self.view.show_partial(self.task, text);
    }

    async fn complete(&mut self, result: Value) {
        let text = result
            .get(self.task.result_field())
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty());
        let Some(text) = text else {
            self.fail(self.task.invalid_response_message().to_string())
                .await;
            return;
        };

        match self.task {
            ReplyTask::Draft => self.view.show_draft(text),
            ReplyTask::Summary => self.view.show_summary(text),
        }
        info!(task = ?self.task, "Reply task completed");
    }

    async fn fail(&mut self, message: String) {
        warn!(task = ?self.task, error = %message, "Reply task failed");
        self.notifier
            .danger(&format!("{}: {message}", self.task.failure_prefix()))
            .await;
        self.view.show_initial();
    }
}
