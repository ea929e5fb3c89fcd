use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::host::{HostSdk, Notifier, TemplateRequest, TicketId};
use crate::view::AnswerMetadata;

pub const RATING_FAILED_MESSAGE: &str = "Could not save rating.";

/// How helpful an answer was, from 1 (very poor) to 5 (excellent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidRating(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Very poor",
            2 => "Poor",
            3 => "Neutral",
            4 => "Good",
            _ => "Excellent",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}

#[derive(Serialize)]
struct RatingPayload<'a> {
    conversation_id: &'a str,
    source_ticket_ids: &'a [TicketId],
    rating: Rating,
}

/// Records answer ratings with the backend.
#[derive(Clone)]
pub struct RatingService {
    host: Arc<dyn HostSdk>,
    notifier: Notifier,
    template: String,
}

impl RatingService {
    pub fn new(host: Arc<dyn HostSdk>, template: impl Into<String>) -> Self {
        Self {
            notifier: Notifier::new(host.clone()),
            host,
            template: template.into(),
        }
    }

    pub async fn submit(&self, answer: &AnswerMetadata, rating: Rating) -> Result<()> {
        let Some(conversation_id) = answer.conversation_id.as_deref().filter(|id| !id.is_empty())
        else {
            return Err(Error::NotRateable);
        };

        let payload = RatingPayload {
            conversation_id,
            source_ticket_ids: &answer.source_ticket_ids,
            rating,
        };
        let request = TemplateRequest::with_body(&payload)?;
        match self.host.invoke_template(&self.template, request).await
        {
            Ok(_) => {
                info!(conversation_id, rating = rating.value(), "Rating submitted");
                Ok(())
            }
            Err(err) => {
                warn!(conversation_id, error = %err, "Failed to submit rating");
                self.notifier.danger(RATING_FAILED_MESSAGE).await;
                Err(err.into())
            }
        }
    }
}
