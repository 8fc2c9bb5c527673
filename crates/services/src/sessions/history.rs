use chrono::{DateTime, Utc};
use std::sync::Arc;

use fit_core::model::WorkoutId;
use storage::repository::{WorkoutSessionRepository, WorkoutSessionRow};

use crate::error::HistoryError;

/// Recorded workout session, ready for a history list.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHistoryItem {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub duration_label: String,
    pub exercises_completed: u32,
    pub total_exercises: u32,
    pub completion_ratio: f64,
}

impl SessionHistoryItem {
    #[must_use]
    pub fn from_row(row: &WorkoutSessionRow) -> Self {
        let summary = &row.summary;
        Self {
            id: row.id,
            recorded_at: row.recorded_at,
            duration_seconds: summary.duration_seconds(),
            duration_label: format_duration(summary.duration_seconds()),
            exercises_completed: summary.exercises_completed(),
            total_exercises: summary.total_exercises(),
            completion_ratio: summary.completion_ratio(),
        }
    }
}

/// Format seconds as `m:ss`, or `h:mm:ss` from one hour up.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Read side for recorded workout sessions.
#[derive(Clone)]
pub struct HistoryService {
    sessions: Arc<dyn WorkoutSessionRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(sessions: Arc<dyn WorkoutSessionRepository>) -> Self {
        Self { sessions }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Most recent sessions for a workout, newest first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Storage` on repository failures.
    pub async fn recent_sessions(
        &self,
        workout_id: &WorkoutId,
        limit: u32,
    ) -> Result<Vec<SessionHistoryItem>, HistoryError> {
        let rows = self.sessions.list_sessions(workout_id, limit).await?;
        Ok(rows.iter().map(SessionHistoryItem::from_row).collect())
    }
}
