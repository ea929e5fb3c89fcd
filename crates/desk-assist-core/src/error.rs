use thiserror::Error;

use crate::host::HostError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("No task id was returned when starting the task.")]
    MissingTaskId,
    #[error("Superseded by a newer submission.")]
    Superseded,
    #[error("Query is empty")]
    EmptyQuery,
    #[error("{0}")]
    InvalidResponse(String),
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("This answer cannot be rated.")]
    NotRateable,
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The message shown to an agent in a notification or inline error.
    pub fn display_message(&self) -> String {
        match self {
            Error::Host(err) => err.display_message(),
            other => other.to_string(),
        }
    }
}
