//! Application-wide error types using thiserror
//!
//! Module errors convert into `AppError` with `?` at the application edge.

use thiserror::Error;

use crate::adapters::errors::VenueError;
use crate::core::channels::QueueError;
use crate::core::history::HistoryError;
use crate::notify::NotifyError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Alert queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
