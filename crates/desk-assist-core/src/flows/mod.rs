//! Submission flows: start a backend task, poll it, and drive a view.
//!
//! All flows share the same shape. They assemble a payload, start a task
//! through a template, hand the returned id to the [`TaskPoller`] and adapt
//! its callbacks to view updates through a [`StreamingObserver`].

mod query;
mod reply;

pub use query::{NO_VALID_ANSWER_MESSAGE, QueryFlow, QueryRequest};
pub use reply::ReplyFlow;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{DeskConfig, TemplateNames};
use crate::context::ContextBuilder;
use crate::error::{Error, Result};
use crate::host::{HostSdk, Notifier, TemplateRequest};
use crate::task::{PollObserver, TaskId, TaskPoller};

/// Everything a flow needs from the host, wired from one config.
#[derive(Clone)]
pub struct FlowServices {
    pub(crate) host: Arc<dyn HostSdk>,
    pub(crate) poller: TaskPoller,
    pub(crate) context: ContextBuilder,
    pub(crate) notifier: Notifier,
    pub(crate) templates: TemplateNames,
    pub(crate) history_window: usize,
}

impl FlowServices {
    pub fn new(host: Arc<dyn HostSdk>, config: &DeskConfig) -> Self {
        Self {
            poller: TaskPoller::new(host.clone(), config.templates.task_status.clone())
                .with_interval(config.poll_interval()),
            context: ContextBuilder::new(
                host.clone(),
                config.templates.ticket_conversations.clone(),
            ),
            notifier: Notifier::new(host.clone()),
            templates: config.templates.clone(),
            history_window: config.history_window,
            host,
        }
    }

    pub fn host(&self) -> &Arc<dyn HostSdk> {
        &self.host
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Start a backend task and return its id.
    pub(crate) async fn start_task(&self, template: &str, payload: impl Serialize) -> Result<TaskId> {
        let response = self
            .host
            .invoke_template(template, TemplateRequest::with_body(payload)?)
            .await?;
        let task_id = TaskId::from_start_response(&response).ok_or(Error::MissingTaskId)?;
        debug!(template, %task_id, "Started backend task");
        Ok(task_id)
    }
}

/// The poll session currently owned by a flow.
///
/// A flow keeps at most one session alive. The token is registered before the
/// task is started, so a submission whose start call is still in flight is
/// cancelled by a newer one just like a polling session is.
#[derive(Default)]
pub(crate) struct ActiveSession {
    token: Mutex<Option<CancellationToken>>,
}

impl ActiveSession {
    /// Register a fresh token for a new submission, cancelling the previous one.
    pub(crate) async fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        self.set(token.clone()).await;
        token
    }

    pub(crate) async fn cancel(&self) {
        if let Some(token) = self.token.lock().await.take()
            && !token.is_cancelled()
        {
            debug!("Cancelling superseded poll session");
            token.cancel();
        }
    }

    pub(crate) async fn set(&self, token: CancellationToken) {
        if let Some(previous) = self.token.lock().await.replace(token) {
            previous.cancel();
        }
    }
}

/// The flow-specific half of a poll session.
#[async_trait]
pub(crate) trait StreamTarget: Send {
    /// Leave the loading state; called once, on the first non-empty text.
    fn begin_streaming(&mut self);

    /// Replace the displayed text. Partial results are cumulative.
    fn show_partial(&mut self, text: &str);

    async fn complete(&mut self, result: Value);

    async fn fail(&mut self, message: String);
}

/// Adapts poller callbacks to a [`StreamTarget`].
pub(crate) struct StreamingObserver<T> {
    target: T,
    streaming: bool,
}

impl<T> StreamingObserver<T> {
    pub(crate) fn new(target: T) -> Self {
        Self {
            target,
            streaming: false,
        }
    }
}

#[async_trait]
impl<T: StreamTarget> PollObserver for StreamingObserver<T> {
    async fn on_token(&mut self, partial: Option<&str>) {
        let Some(text) = partial.filter(|t| !t.is_empty()) else {
            return;
        };
        if !self.streaming {
            self.streaming = true;
            self.target.begin_streaming();
        }
        self.target.show_partial(text);
    }

    async fn on_complete(&mut self, result: Value) {
        self.target.complete(result).await;
    }

    async fn on_error(&mut self, message: String) {
        self.target.fail(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CallLog {
        calls: Vec<String>,
    }

    #[async_trait]
    impl StreamTarget for CallLog {
        fn begin_streaming(&mut self) {
            self.calls.push("begin".to_string());
        }

        fn show_partial(&mut self, text: &str) {
            self.calls.push(format!("show:{text}"));
        }

        async fn complete(&mut self, result: Value) {
            self.calls.push(format!("complete:{result}"));
        }

        async fn fail(&mut self, message: String) {
            self.calls.push(format!("fail:{message}"));
        }
    }

    #[tokio::test]
    async fn first_non_empty_token_begins_streaming_once() {
        let mut observer = StreamingObserver::new(CallLog::default());

        observer.on_token(None).await;
        observer.on_token(Some("")).await;
        observer.on_token(Some("Hel")).await;
        observer.on_token(Some("Hello")).await;
        observer.on_complete(serde_json::json!(1)).await;

        assert_eq!(
            observer.target.calls,
            ["begin", "show:Hel", "show:Hello", "complete:1"]
        );
    }

    #[tokio::test]
    async fn beginning_a_submission_cancels_the_running_one() {
        let active = ActiveSession::default();

        let older = active.begin().await;
        let newer = active.begin().await;

        assert!(older.is_cancelled());
        assert!(!newer.is_cancelled());
    }

    #[tokio::test]
    async fn replacing_a_session_cancels_the_previous_one() {
        let active = ActiveSession::default();
        let first = CancellationToken::new();
        let second = CancellationToken::new();

        active.set(first.clone()).await;
        active.set(second.clone()).await;
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        active.cancel().await;
        assert!(second.is_cancelled());
    }
}
