use std::sync::Arc;
use std::time::Duration;

use desk_assist_core::config::DeskConfig;
use desk_assist_core::conversation::{ConversationEntry, format_conversations};
use desk_assist_core::error::Error;
use desk_assist_core::flows::{FlowServices, NO_VALID_ANSWER_MESSAGE, QueryFlow, QueryRequest, ReplyFlow};
use desk_assist_core::host::{HostError, NotifyKind, TicketData};
use desk_assist_core::task::PollOutcome;
use desk_assist_core::test_utils::{RecordingView, ScriptedHost, ViewEvent};
use desk_assist_core::view::{AnswerMessage, AnswerMetadata, ReplyTask};
use serde_json::{Value, json};

const START_QUERY: &str = "startQuery";
const START_DRAFT: &str = "startDraftReply";
const START_SUMMARIZE: &str = "startSummarize";
const STATUS: &str = "getTaskStatus";
const CONVERSATIONS: &str = "getTicketConversations";

fn services(host: &Arc<ScriptedHost>) -> FlowServices {
    FlowServices::new(host.clone(), &DeskConfig::default())
}

fn query_flow(host: &Arc<ScriptedHost>) -> (QueryFlow, Arc<RecordingView>) {
    let view = Arc::new(RecordingView::new());
    (QueryFlow::new(services(host), view.clone()), view)
}

fn reply_flow(host: &Arc<ScriptedHost>, task: ReplyTask) -> (ReplyFlow, Arc<RecordingView>) {
    let view = Arc::new(RecordingView::new());
    (ReplyFlow::new(task, services(host), view.clone()), view)
}

fn ticket() -> TicketData {
    serde_json::from_value(json!({
        "id": 42,
        "subject": "Card declined",
        "description_text": "My card keeps getting declined.",
        "custom_fields": { "application": "Billing" }
    }))
    .unwrap()
}

fn conversation() -> Value {
    json!([
        { "incoming": true, "private": false, "body_text": "My card keeps getting declined." },
        { "incoming": false, "private": false, "body_text": "Which card type?" }
    ])
}

fn request_body(host: &ScriptedHost, template: &str, index: usize) -> Value {
    host.calls_to(template)[index].body.clone().unwrap_or(Value::Null)
}

#[tokio::test(start_paused = true)]
async fn query_streams_and_renders_the_answer() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "task_id": "t1" }));
    host.respond(STATUS, json!({ "status": "running", "partial_result": "Hel" }));
    host.respond(
        STATUS,
        json!({
            "status": "completed",
            "partial_result": "Hello",
            "final_result": {
                "answer": "Hello world",
                "conversation_id": "c-1",
                "source_ticket_ids": [7]
            }
        }),
    );
    let (flow, view) = query_flow(&host);

    let session = flow
        .submit(QueryRequest {
            query: "  How do I reset a password?  ".to_string(),
            product_types: vec!["Accounts".to_string()],
            use_ticket_context: false,
        })
        .await
        .unwrap();
    assert_eq!(session.wait().await, PollOutcome::Completed);

    let answer: AnswerMetadata =
        serde_json::from_value(json!({ "conversation_id": "c-1", "source_ticket_ids": [7] }))
            .unwrap();
    assert_eq!(
        view.events(),
        vec![
            ViewEvent::UserMessage("How do I reset a password?".to_string()),
            ViewEvent::Loading(true),
            ViewEvent::Loading(false),
            ViewEvent::Partial("Hel".to_string()),
            ViewEvent::Partial("Hello".to_string()),
            ViewEvent::Answer(AnswerMessage {
                answer: "Hello world".to_string(),
                metadata: answer,
            }),
        ]
    );
    assert_eq!(
        request_body(&host, START_QUERY, 0),
        json!({
            "user_query": "How do I reset a password?",
            "chat_history": [],
            "product_types_to_search": ["Accounts"],
            "ticket_conversation_context": ""
        })
    );

    let history = flow.history();
    let history = history.lock().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history.turns()[0].answer, "Hello world");
}

#[tokio::test(start_paused = true)]
async fn query_sends_ticket_conversation_when_requested() {
    let host = Arc::new(ScriptedHost::new().with_ticket(ticket()));
    host.respond(CONVERSATIONS, conversation());
    host.respond(START_QUERY, json!({ "task_id": "t1" }));
    host.respond(STATUS, json!({ "status": "completed", "final_result": { "answer": "ok" } }));
    let (flow, _view) = query_flow(&host);

    let session = flow
        .submit(QueryRequest {
            use_ticket_context: true,
            ..QueryRequest::new("Why is it declined?")
        })
        .await
        .unwrap();
    session.wait().await;

    let entries: Vec<ConversationEntry> = serde_json::from_value(conversation()).unwrap();
    assert_eq!(
        request_body(&host, START_QUERY, 0)["ticket_conversation_context"],
        json!(format_conversations(&entries))
    );
    assert_eq!(
        host.calls_to(CONVERSATIONS)[0].context_str("ticket_id").as_deref(),
        Some("42")
    );
}

#[tokio::test(start_paused = true)]
async fn query_history_window_keeps_the_latest_turns() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "task_id": "t" }));
    host.respond(STATUS, json!({ "status": "completed", "final_result": { "answer": "A" } }));
    let (flow, _view) = query_flow(&host);

    for i in 0..6 {
        let session = flow.submit(QueryRequest::new(format!("q{i}"))).await.unwrap();
        session.wait().await;
    }

    let history = request_body(&host, START_QUERY, 5)["chat_history"].clone();
    let questions: Vec<_> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|turn| turn["question"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(questions, ["q1", "q2", "q3", "q4"]);
}

#[tokio::test(start_paused = true)]
async fn empty_query_is_rejected_without_rendering() {
    let host = Arc::new(ScriptedHost::new());
    let (flow, view) = query_flow(&host);

    let result = flow.submit(QueryRequest::new("   ")).await;

    assert!(matches!(result, Err(Error::EmptyQuery)));
    assert!(view.events().is_empty());
    assert!(host.calls_to(START_QUERY).is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_task_id_is_surfaced_without_polling() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "status": "accepted" }));
    let (flow, view) = query_flow(&host);

    let result = flow.submit(QueryRequest::new("Hi")).await;

    assert!(matches!(result, Err(Error::MissingTaskId)));
    let message = Error::MissingTaskId.to_string();
    assert_eq!(view.last(), Some(ViewEvent::Error(format!("Error: {message}"))));
    assert_eq!(host.notifications(), vec![(NotifyKind::Danger, message)]);
    assert!(host.calls_to(STATUS).is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_failure_shows_backend_detail() {
    let host = Arc::new(ScriptedHost::new());
    host.fail(
        START_QUERY,
        HostError::with_response(422, r#"{"detail":"Query too long"}"#),
    );
    let (flow, view) = query_flow(&host);

    assert!(flow.submit(QueryRequest::new("Hi")).await.is_err());
    assert_eq!(
        view.events(),
        vec![
            ViewEvent::UserMessage("Hi".to_string()),
            ViewEvent::Loading(true),
            ViewEvent::Loading(false),
            ViewEvent::Error("Error: Query too long".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_task_reports_its_message() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "task_id": "t1" }));
    host.respond(STATUS, json!({ "status": "failed", "error_message": "LLM timeout" }));
    let (flow, view) = query_flow(&host);

    let session = flow.submit(QueryRequest::new("Hi")).await.unwrap();
    assert_eq!(session.wait().await, PollOutcome::Failed);

    assert_eq!(view.last(), Some(ViewEvent::Error("Error: LLM timeout".to_string())));
    assert_eq!(
        host.notifications(),
        vec![(NotifyKind::Danger, "LLM timeout".to_string())]
    );
    assert!(flow.history().lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn completion_without_answer_is_an_error() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "task_id": "t1" }));
    host.respond(STATUS, json!({ "status": "completed", "final_result": { "conversation_id": "c" } }));
    let (flow, view) = query_flow(&host);

    let session = flow.submit(QueryRequest::new("Hi")).await.unwrap();
    session.wait().await;

    assert_eq!(
        view.last(),
        Some(ViewEvent::Error(format!("Error: {NO_VALID_ANSWER_MESSAGE}")))
    );
    assert!(flow.history().lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn resubmitting_cancels_the_previous_session() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "task_id": "t1" }));
    host.respond(START_QUERY, json!({ "task_id": "t2" }));
    host.respond(STATUS, json!({ "status": "running" }));
    let (flow, view) = query_flow(&host);

    let first = flow.submit(QueryRequest::new("Same question")).await.unwrap();
    let second = flow.submit(QueryRequest::new("Same question")).await.unwrap();
    assert!(first.is_cancelled());

    host.reset(STATUS);
    host.respond(STATUS, json!({ "status": "completed", "final_result": { "answer": "A" } }));

    assert_eq!(first.wait().await, PollOutcome::Cancelled);
    assert_eq!(second.wait().await, PollOutcome::Completed);

    let answers = view
        .events()
        .into_iter()
        .filter(|event| matches!(event, ViewEvent::Answer(_)))
        .count();
    assert_eq!(answers, 1);
    assert_eq!(flow.history().lock().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_start_of_an_older_query_never_renders() {
    let host = Arc::new(ScriptedHost::new());
    host.respond_after(START_QUERY, Duration::from_millis(500), json!({ "task_id": "t0" }));
    host.respond_after(START_QUERY, Duration::from_millis(10), json!({ "task_id": "t1" }));
    host.respond(STATUS, json!({ "status": "completed", "final_result": { "answer": "Fresh" } }));
    let (flow, view) = query_flow(&host);

    let (older, newer) = tokio::join!(flow.submit(QueryRequest::new("Old question")), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        flow.submit(QueryRequest::new("New question")).await
    });

    assert!(matches!(older, Err(Error::Superseded)));
    assert_eq!(newer.unwrap().wait().await, PollOutcome::Completed);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let answers: Vec<_> = view
        .events()
        .into_iter()
        .filter(|event| matches!(event, ViewEvent::Answer(_)))
        .collect();
    assert_eq!(answers.len(), 1);
    assert!(!view.events().iter().any(|event| matches!(event, ViewEvent::Error(_))));
    let history = flow.history();
    let history = history.lock().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history.turns()[0].question, "New question");
    assert!(host.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn streamed_answer_clears_loading_once() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "task_id": "t1" }));
    host.respond(STATUS, json!({ "status": "running", "partial_result": "Par" }));
    host.respond(STATUS, json!({ "status": "failed", "error_message": "Backend restarted" }));
    let (flow, view) = query_flow(&host);

    let session = flow.submit(QueryRequest::new("Hi")).await.unwrap();
    assert_eq!(session.wait().await, PollOutcome::Failed);

    assert_eq!(
        view.events(),
        vec![
            ViewEvent::UserMessage("Hi".to_string()),
            ViewEvent::Loading(true),
            ViewEvent::Loading(false),
            ViewEvent::Partial("Par".to_string()),
            ViewEvent::Error("Error: Backend restarted".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling_silently() {
    let host = Arc::new(ScriptedHost::new());
    host.respond(START_QUERY, json!({ "task_id": "t1" }));
    host.respond(STATUS, json!({ "status": "running", "partial_result": "..." }));
    let (flow, view) = query_flow(&host);

    let session = flow.submit(QueryRequest::new("Hi")).await.unwrap();
    flow.cancel().await;

    assert_eq!(session.wait().await, PollOutcome::Cancelled);
    assert!(host.calls_to(STATUS).is_empty());
    assert_eq!(view.last(), Some(ViewEvent::Loading(true)));
}

#[tokio::test(start_paused = true)]
async fn draft_streams_into_the_reply_view() {
    let host = Arc::new(ScriptedHost::new().with_ticket(ticket()));
    host.respond(CONVERSATIONS, conversation());
    host.respond(START_DRAFT, json!({ "response": "{\"task_id\":\"d1\"}" }));
    host.respond(STATUS, json!({ "status": "running", "partial_result": "Dear" }));
    host.respond(
        STATUS,
        json!({
            "status": "completed",
            "partial_result": "Dear customer",
            "final_result": { "draft": "Dear customer, please retry." }
        }),
    );
    let (flow, view) = reply_flow(&host, ReplyTask::Draft);

    let session = flow.submit().await.unwrap();
    assert_eq!(session.wait().await, PollOutcome::Completed);

    assert_eq!(
        view.events(),
        vec![
            ViewEvent::ReplyLoading(ReplyTask::Draft),
            ViewEvent::ReplyPartial(ReplyTask::Draft, "Dear".to_string()),
            ViewEvent::ReplyPartial(ReplyTask::Draft, "Dear customer".to_string()),
            ViewEvent::Draft("Dear customer, please retry.".to_string()),
        ]
    );

    let entries: Vec<ConversationEntry> = serde_json::from_value(conversation()).unwrap();
    assert_eq!(
        request_body(&host, START_DRAFT, 0),
        json!({
            "ticket_conversation_context": format_conversations(&entries),
            "product_type": "Billing",
            "ticket_id": 42
        })
    );
}

#[tokio::test(start_paused = true)]
async fn draft_without_draft_field_returns_to_initial_view() {
    let host = Arc::new(ScriptedHost::new().with_ticket(ticket()));
    host.respond(START_DRAFT, json!({ "task_id": "d1" }));
    host.respond(STATUS, json!({ "status": "completed", "final_result": { "summary": "x" } }));
    let (flow, view) = reply_flow(&host, ReplyTask::Draft);

    flow.submit().await.unwrap().wait().await;

    assert_eq!(view.last(), Some(ViewEvent::Initial));
    assert_eq!(
        host.notifications(),
        vec![(
            NotifyKind::Danger,
            "Could not draft reply: Invalid response from draft service.".to_string()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn summarize_sends_context_without_product_type() {
    let host = Arc::new(ScriptedHost::new().with_ticket(ticket()));
    host.respond(CONVERSATIONS, json!([]));
    host.respond(START_SUMMARIZE, json!({ "task_id": "s1" }));
    host.respond(
        STATUS,
        json!({ "status": "completed", "final_result": { "summary": "Card declined twice." } }),
    );
    let (flow, view) = reply_flow(&host, ReplyTask::Summary);

    flow.submit().await.unwrap().wait().await;

    assert_eq!(view.last(), Some(ViewEvent::Summary("Card declined twice.".to_string())));
    assert_eq!(
        request_body(&host, START_SUMMARIZE, 0),
        json!({
            "ticket_conversation_context":
                "Ticket Context:\nSubject: Card declined\nDescription: My card keeps getting declined.\n---",
            "ticket_id": 42
        })
    );
}

#[tokio::test(start_paused = true)]
async fn summarize_surfaces_ticket_fetch_failure() {
    let host = Arc::new(ScriptedHost::new());
    host.fail_ticket(HostError::message("Ticket unavailable"));
    let (flow, view) = reply_flow(&host, ReplyTask::Summary);

    assert!(flow.submit().await.is_err());

    assert_eq!(
        view.events(),
        vec![ViewEvent::ReplyLoading(ReplyTask::Summary), ViewEvent::Initial]
    );
    assert_eq!(
        host.notifications(),
        vec![(
            NotifyKind::Danger,
            "Could not summarize: Ticket unavailable".to_string()
        )]
    );
    assert!(host.calls_to(START_SUMMARIZE).is_empty());
}

#[tokio::test(start_paused = true)]
async fn regenerating_during_a_slow_start_keeps_only_the_newer_draft() {
    let host = Arc::new(ScriptedHost::new().with_ticket(ticket()));
    host.respond_after(START_DRAFT, Duration::from_millis(500), json!({ "task_id": "d0" }));
    host.respond_after(START_DRAFT, Duration::from_millis(10), json!({ "task_id": "d1" }));
    host.respond(STATUS, json!({ "status": "completed", "final_result": { "draft": "Hi there" } }));
    let (flow, view) = reply_flow(&host, ReplyTask::Draft);

    let (older, newer) = tokio::join!(flow.submit(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        flow.submit().await
    });

    assert!(matches!(older, Err(Error::Superseded)));
    assert_eq!(newer.unwrap().wait().await, PollOutcome::Completed);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(
        view.events(),
        vec![
            ViewEvent::ReplyLoading(ReplyTask::Draft),
            ViewEvent::ReplyLoading(ReplyTask::Draft),
            ViewEvent::Draft("Hi there".to_string()),
        ]
    );
    assert!(host.notifications().is_empty());
}
