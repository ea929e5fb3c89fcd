use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Result, eyre};

use super::{Command, DeskApp};
use crate::terminal::TerminalView;
use desk_assist_core::editor::ReplyActions;
use desk_assist_core::flows::ReplyFlow;
use desk_assist_core::task::PollOutcome;
use desk_assist_core::view::ReplyTask;

/// Draft a reply to, or summarize, the open ticket.
pub struct ReplyCommand {
    pub app: DeskApp,
    pub task: ReplyTask,
    /// Insert the result into the editor once it is ready.
    pub insert: bool,
}

#[async_trait]
impl Command for ReplyCommand {
    async fn execute(&self) -> Result<()> {
        let view = Arc::new(TerminalView::new());
        let flow = ReplyFlow::new(self.task, self.app.services(), view.clone());

        let session = flow.submit().await?;
        let outcome = tokio::select! {
            outcome = session.wait() => outcome,
            _ = tokio::signal::ctrl_c() => {
                flow.cancel().await;
                PollOutcome::Cancelled
            }
        };
        match outcome {
            PollOutcome::Completed => {}
            PollOutcome::Failed => return Err(eyre!("{}", failure(self.task))),
            PollOutcome::Cancelled => return Err(eyre!("Cancelled")),
        }

        // A completed task with an unusable result has already been reported.
        let Some(text) = view.take_result() else {
            return Err(eyre!("{}", failure(self.task)));
        };
        if self.insert {
            let actions = ReplyActions::new(self.app.host.clone());
            match self.task {
                ReplyTask::Draft => actions.accept_draft(&text).await?,
                ReplyTask::Summary => actions.insert_summary(&text).await?,
            }
        }
        Ok(())
    }
}

fn failure(task: ReplyTask) -> &'static str {
    match task {
        ReplyTask::Draft => "No draft was produced",
        ReplyTask::Summary => "No summary was produced",
    }
}
