//! Error type shared by the library and the command line front end.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Annealing needs a real tour to permute.
    #[error("need at least 2 cities to anneal, got {0}")]
    TooFewCities(usize),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("invalid instance: {0}")]
    InvalidInstance(String),
    #[error("render failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_schedule(message: impl Into<String>) -> Self {
        Self::InvalidSchedule(message.into())
    }

    pub fn invalid_instance(message: impl Into<String>) -> Self {
        Self::InvalidInstance(message.into())
    }
}
