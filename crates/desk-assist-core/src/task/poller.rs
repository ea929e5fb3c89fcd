use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use super::{TaskId, TaskStatus, TaskStatusSnapshot};
use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::host::{HostSdk, TemplateRequest};

pub const MALFORMED_STATUS_MESSAGE: &str = "Polling response was empty or invalid.";
pub const TASK_FAILED_MESSAGE: &str = "Task failed without a specific message.";

/// Receives the progress of one poll session.
///
/// `on_token` may fire any number of times, always before the terminal
/// callback of the same tick. Exactly one of `on_complete` / `on_error` fires
/// unless the session is cancelled first, in which case neither does.
#[async_trait]
pub trait PollObserver: Send {
    /// Latest cumulative partial text, `None` if the backend has none yet.
    async fn on_token(&mut self, partial: Option<&str>);

    async fn on_complete(&mut self, result: Value);

    async fn on_error(&mut self, message: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Watches backend tasks by polling their status on a fixed cadence.
#[derive(Clone)]
pub struct TaskPoller {
    host: Arc<dyn HostSdk>,
    status_template: String,
    interval: Duration,
}

impl TaskPoller {
    pub fn new(host: Arc<dyn HostSdk>, status_template: impl Into<String>) -> Self {
        Self {
            host,
            status_template: status_template.into(),
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll on a background task. The returned session can be cancelled.
    pub fn spawn<O>(&self, task_id: TaskId, observer: O) -> PollSession
    where
        O: PollObserver + 'static,
    {
        self.spawn_with_token(task_id, observer, CancellationToken::new())
    }

    /// Like [`TaskPoller::spawn`], but cancelled through a token the caller
    /// already owns.
    pub fn spawn_with_token<O>(
        &self,
        task_id: TaskId,
        mut observer: O,
        token: CancellationToken,
    ) -> PollSession
    where
        O: PollObserver + 'static,
    {
        let poller = self.clone();
        let session_token = token.clone();
        let span = info_span!("poll_task", task_id = %task_id);
        let spawned_id = task_id.clone();

        let handle = tokio::spawn(
            async move {
                poller
                    .run(&spawned_id, &mut observer, &session_token)
                    .await
            }
            .instrument(span),
        );

        PollSession {
            task_id,
            token,
            handle,
        }
    }

    /// Poll until the task reaches a terminal state or `cancel` fires.
    ///
    /// The first status check happens one interval after the call. Ticks never
    /// overlap: a slow status request delays the next tick instead.
    pub async fn run<O>(
        &self,
        task_id: &TaskId,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> PollOutcome
    where
        O: PollObserver + ?Sized,
    {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(%task_id, ticks, "Polling cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = ticker.tick() => {}
            }
            ticks += 1;

            let request = TemplateRequest::with_context(json!({ "task_id": task_id }));
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(%task_id, ticks, "Polling cancelled during status check");
                    return PollOutcome::Cancelled;
                }
                response = self.host.invoke_template(&self.status_template, request) => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    warn!(%task_id, ticks, error = %err, "Status check failed");
                    observer.on_error(err.display_message()).await;
                    return PollOutcome::Failed;
                }
            };

            let Some(snapshot) = TaskStatusSnapshot::decode(&response) else {
                warn!(%task_id, ticks, "Status response was empty or invalid");
                observer.on_error(MALFORMED_STATUS_MESSAGE.to_string()).await;
                return PollOutcome::Failed;
            };

            observer.on_token(snapshot.partial_result.as_deref()).await;
            if cancel.is_cancelled() {
                debug!(%task_id, ticks, "Polling cancelled while streaming");
                return PollOutcome::Cancelled;
            }

            match snapshot.status {
                TaskStatus::Completed => {
                    debug!(%task_id, ticks, "Task completed");
                    observer
                        .on_complete(snapshot.final_result.unwrap_or(Value::Null))
                        .await;
                    return PollOutcome::Completed;
                }
                TaskStatus::Failed => {
                    let message = snapshot
                        .error_message
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| TASK_FAILED_MESSAGE.to_string());
                    debug!(%task_id, ticks, %message, "Task failed");
                    observer.on_error(message).await;
                    return PollOutcome::Failed;
                }
                TaskStatus::Pending | TaskStatus::Running | TaskStatus::Other => {}
            }
        }
    }
}

/// Handle to a poll session running in the background.
///
/// Dropping the handle does not stop polling; call [`PollSession::cancel`].
#[derive(Debug)]
pub struct PollSession {
    task_id: TaskId,
    token: CancellationToken,
    handle: JoinHandle<PollOutcome>,
}

impl PollSession {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Stop polling. A callback already running finishes, but nothing fires
    /// after it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> PollOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(task_id = %self.task_id, error = %err, "Poll session ended abnormally");
                PollOutcome::Cancelled
            }
        }
    }
}
