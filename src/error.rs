use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Entity not found: {0}")]
    NotFound(Uuid),

    #[error("Precondition failed: the entity was modified by another writer")]
    Concurrency,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed patch document: {0}")]
    InvalidPatch(String),

    #[error("Operation canceled")]
    Canceled,

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppointmentError {
    /// Errors that describe a problem with the caller's request rather than
    /// with the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppointmentError::NotFound(_)
                | AppointmentError::Concurrency
                | AppointmentError::Validation(_)
                | AppointmentError::InvalidPatch(_)
                | AppointmentError::Canceled
        )
    }
}

pub type Result<T> = std::result::Result<T, AppointmentError>;
