//! Shared error types for the services crate.

use thiserror::Error;

use fit_core::model::{ExerciseId, WorkoutError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::sessions::FinishOutcome;

/// Errors emitted by the navigation primitive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
    #[error("navigation ({intent}) failed: {reason}")]
    Failed { intent: String, reason: String },
}

/// Errors emitted by session recorders.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("session recorder is not configured")]
    Disabled,
    #[error("session recorder returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the timer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimerError {
    #[error("timer requires a running tokio runtime")]
    NoRuntime,
}

/// Errors emitted by workout session components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("durable slot unavailable: {0}")]
    Slot(#[from] StorageError),
    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("exercise {0} is not part of this workout")]
    UnknownExercise(ExerciseId),
    #[error("session finished but navigation failed: {source}")]
    NavigationAfterFinish {
        outcome: Box<FinishOutcome>,
        #[source]
        source: NavigationError,
    },
}

/// Errors emitted by `HistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error("workout {0} does not exist")]
    UnknownWorkout(String),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Workout(#[from] WorkoutError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
