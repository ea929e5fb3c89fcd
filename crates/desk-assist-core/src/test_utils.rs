//! Test utilities for desk-assist-core
//!
//! An in-memory host with scripted template responses, plus views and
//! observers that record what they were asked to do.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::host::{EditorInsert, HostError, HostSdk, NotifyKind, TemplateRequest, TicketData};
use crate::task::PollObserver;
use crate::view::{AnswerMessage, ChatView, ReplyTask, ReplyView};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
struct Scripted {
    response: Result<Value, HostError>,
    delay: Duration,
}

#[derive(Default)]
struct HostState {
    ticket: Option<Result<TicketData, HostError>>,
    responses: HashMap<String, VecDeque<Scripted>>,
    calls: Vec<(String, TemplateRequest)>,
    notifications: Vec<(NotifyKind, String)>,
    editor: Vec<EditorInsert>,
    editor_error: Option<HostError>,
    notify_error: Option<HostError>,
}

/// Host whose template responses are queued per template name.
///
/// Responses are consumed in order; the last one queued for a template keeps
/// being returned once the queue is down to it. Templates with nothing queued
/// answer with an empty JSON object. A response can be held back for a while
/// to model a slow backend.
#[derive(Default)]
pub struct ScriptedHost {
    state: Mutex<HostState>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticket(self, ticket: TicketData) -> Self {
        lock(&self.state).ticket = Some(Ok(ticket));
        self
    }

    pub fn fail_ticket(&self, error: HostError) {
        lock(&self.state).ticket = Some(Err(error));
    }

    pub fn respond(&self, template: &str, response: Value) {
        self.push(template, Ok(response), Duration::ZERO);
    }

    /// Queue a response that is returned only after `delay`.
    pub fn respond_after(&self, template: &str, delay: Duration, response: Value) {
        self.push(template, Ok(response), delay);
    }

    pub fn fail(&self, template: &str, error: HostError) {
        self.push(template, Err(error), Duration::ZERO);
    }

    /// Drop everything queued for `template`.
    pub fn reset(&self, template: &str) {
        lock(&self.state).responses.remove(template);
    }

    pub fn fail_editor(&self, error: HostError) {
        lock(&self.state).editor_error = Some(error);
    }

    pub fn fail_notifications(&self, error: HostError) {
        lock(&self.state).notify_error = Some(error);
    }

    fn push(&self, template: &str, response: Result<Value, HostError>, delay: Duration) {
        lock(&self.state)
            .responses
            .entry(template.to_string())
            .or_default()
            .push_back(Scripted { response, delay });
    }

    pub fn calls_to(&self, template: &str) -> Vec<TemplateRequest> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|(name, _)| name == template)
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn notifications(&self) -> Vec<(NotifyKind, String)> {
        lock(&self.state).notifications.clone()
    }

    pub fn editor_inserts(&self) -> Vec<EditorInsert> {
        lock(&self.state).editor.clone()
    }
}

#[async_trait]
impl HostSdk for ScriptedHost {
    async fn invoke_template(
        &self,
        template: &str,
        request: TemplateRequest,
    ) -> Result<Value, HostError> {
        let scripted = {
            let mut state = lock(&self.state);
            state.calls.push((template.to_string(), request));
            match state.responses.get_mut(template) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        let Some(Scripted { response, delay }) = scripted else {
            return Ok(json!({}));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn ticket(&self) -> Result<TicketData, HostError> {
        lock(&self.state)
            .ticket
            .clone()
            .unwrap_or_else(|| Ok(TicketData::default()))
    }

    async fn notify(&self, kind: NotifyKind, message: &str) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.notify_error.clone() {
            return Err(err);
        }
        state.notifications.push((kind, message.to_string()));
        Ok(())
    }

    async fn set_editor_value(&self, insert: EditorInsert) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.editor_error.clone() {
            return Err(err);
        }
        state.editor.push(insert);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    Token(Option<String>),
    Complete(Value),
    Error(String),
}

/// Observer that records every callback, locally and in a shared log that
/// survives handing the observer to a spawned session.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<ObserverEvent>,
    shared: Arc<tokio::sync::Mutex<Vec<ObserverEvent>>>,
}

impl RecordingObserver {
    pub fn shared(&self) -> Arc<tokio::sync::Mutex<Vec<ObserverEvent>>> {
        self.shared.clone()
    }

    pub fn terminal_events(&self) -> usize {
        self.events
            .iter()
            .filter(|e| !matches!(e, ObserverEvent::Token(_)))
            .count()
    }

    async fn record(&mut self, event: ObserverEvent) {
        self.shared.lock().await.push(event.clone());
        self.events.push(event);
    }
}

#[async_trait]
impl PollObserver for RecordingObserver {
    async fn on_token(&mut self, partial: Option<&str>) {
        self.record(ObserverEvent::Token(partial.map(str::to_string)))
            .await;
    }

    async fn on_complete(&mut self, result: Value) {
        self.record(ObserverEvent::Complete(result)).await;
    }

    async fn on_error(&mut self, message: String) {
        self.record(ObserverEvent::Error(message)).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    UserMessage(String),
    Loading(bool),
    Partial(String),
    Answer(AnswerMessage),
    Error(String),
    ReplyLoading(ReplyTask),
    ReplyPartial(ReplyTask, String),
    Draft(String),
    Summary(String),
    Initial,
}

/// View that records every call, for both the chat and reply surfaces.
#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        lock(&self.events).clone()
    }

    pub fn last(&self) -> Option<ViewEvent> {
        lock(&self.events).last().cloned()
    }

    fn record(&self, event: ViewEvent) {
        lock(&self.events).push(event);
    }
}

impl ChatView for RecordingView {
    fn render_user_message(&self, text: &str) {
        self.record(ViewEvent::UserMessage(text.to_string()));
    }

    fn set_loading(&self, loading: bool) {
        self.record(ViewEvent::Loading(loading));
    }

    fn show_partial_answer(&self, text: &str) {
        self.record(ViewEvent::Partial(text.to_string()));
    }

    fn render_answer(&self, message: &AnswerMessage) {
        self.record(ViewEvent::Answer(message.clone()));
    }

    fn render_error(&self, message: &str) {
        self.record(ViewEvent::Error(message.to_string()));
    }
}

impl ReplyView for RecordingView {
    fn show_loading(&self, task: ReplyTask) {
        self.record(ViewEvent::ReplyLoading(task));
    }

    fn show_partial(&self, task: ReplyTask, text: &str) {
        self.record(ViewEvent::ReplyPartial(task, text.to_string()));
    }

    fn show_draft(&self, draft: &str) {
        self.record(ViewEvent::Draft(draft.to_string()));
    }

    fn show_summary(&self, summary: &str) {
        self.record(ViewEvent::Summary(summary.to_string()));
    }

    fn show_initial(&self) {
        self.record(ViewEvent::Initial);
    }
}
