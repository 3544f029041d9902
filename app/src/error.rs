//! Error types for the tasklists application
//!
//! All errors use thiserror for structured error handling.
//! `AppError` is what primary task operations return and can be serialized
//! to a front-end. `ReminderError` is returned by the notification
//! primitives so each caller decides whether to surface or swallow it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reminder error: {0}")]
    Reminder(#[from] ReminderError),

    #[error("Action not found: {0}")]
    ActionNotFound(i64),

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure reported by the notification platform itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification platform error: {0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from scheduling, cancelling and snoozing notifications.
#[derive(Error, Debug)]
pub enum ReminderError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Snooze time must be in the future")]
    InvalidSnoozeTime,
}

/// Lets repository calls (which return `AppError`) be used with `?` inside
/// reminder primitives.
impl From<AppError> for ReminderError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Database(e) => ReminderError::Database(e),
            AppError::Reminder(e) => e,
            other => ReminderError::Store(other.to_string()),
        }
    }
}
