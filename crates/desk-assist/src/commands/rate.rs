use async_trait::async_trait;
use eyre::Result;
use std::io::Write;

use super::{Command, DeskApp};
use desk_assist_core::host::TicketId;
use desk_assist_core::rating::{Rating, RatingService};
use desk_assist_core::view::AnswerMetadata;

pub struct RateCommand {
    pub app: DeskApp,
    pub conversation_id: String,
    pub rating: u8,
    pub source_tickets: Vec<String>,
}

#[async_trait]
impl Command for RateCommand {
    async fn execute(&self) -> Result<()> {
        let rating = Rating::new(self.rating)?;
        let answer = AnswerMetadata {
            conversation_id: Some(self.conversation_id.clone()),
            source_ticket_ids: self
                .source_tickets
                .iter()
                .map(String::as_str)
                .map(parse_ticket_id)
                .collect(),
        };

        RatingService::new(self.app.host.clone(), self.app.config.templates.rating.clone())
            .submit(&answer, rating)
            .await?;

        let mut stdout = std::io::stdout();
        writeln!(stdout, "Rated {rating}.")?;
        Ok(())
    }
}

/// Numeric ids are sent as numbers, anything else as text.
fn parse_ticket_id(id: &str) -> TicketId {
    id.parse::<u64>()
        .map_or_else(|_| TicketId::Text(id.to_string()), TicketId::Number)
}
