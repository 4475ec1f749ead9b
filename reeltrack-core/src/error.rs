use thiserror::Error;

use crate::types::{QueueActionKind, ShowId};

#[derive(Error, Debug)]
pub enum ShowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{action} for show {show} is already queued or running")]
    AlreadyQueued { show: ShowId, action: QueueActionKind },

    #[error("Unknown progress slot: {0}")]
    UnknownSlot(String),

    #[error("Show not found: {0}")]
    NotFound(ShowId),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Metadata source error: {0}")]
    Metadata(String),

    #[error("Update policy error for {show}: {message}")]
    Policy { show: ShowId, message: String },

    #[error("Maintenance step '{step}' failed: {message}")]
    Maintenance { step: String, message: String },

    #[error("Notifier '{notifier}' failed: {message}")]
    Notifier { notifier: String, message: String },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ShowError>;
