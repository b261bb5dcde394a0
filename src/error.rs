//! Error type shared by the library and the command line front-end.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TspError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("degenerate instance: {0} points, at least 3 are required")]
    DegenerateInstance(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid tour: {0}")]
    InvalidTour(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, TspError>;

impl TspError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn invalid_tour(message: impl Into<String>) -> Self {
        Self::InvalidTour(message.into())
    }
}
