use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fit_core::model::{Workout, WorkoutId, WorkoutSessionSummary};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A recorded workout session together with its storage identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutSessionRow {
    pub id: i64,
    pub summary: WorkoutSessionSummary,
    pub recorded_at: DateTime<Utc>,
}

/// Re-check summary constraints at the storage boundary.
///
/// Summaries are validated on construction; this guards against rows or
/// callers that bypass the core type's invariants.
pub(crate) fn revalidate(summary: &WorkoutSessionSummary) -> Result<(), StorageError> {
    WorkoutSessionSummary::new(
        summary.workout_id().clone(),
        summary.duration_seconds(),
        summary.exercises_completed(),
        summary.total_exercises(),
    )
    .map(|_| ())
    .map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Repository contract for the workout catalog.
#[async_trait]
pub trait WorkoutRepository: Send + Sync {
    /// Persist or update a workout and its ordered exercise list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the workout cannot be stored.
    async fn upsert_workout(&self, workout: &Workout) -> Result<(), StorageError>;

    /// Fetch a workout by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures; a missing workout is `Ok(None)`.
    async fn get_workout(&self, id: &WorkoutId) -> Result<Option<Workout>, StorageError>;

    /// List workouts ordered by creation time, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures.
    async fn list_workouts(&self, limit: u32) -> Result<Vec<Workout>, StorageError>;
}

/// Repository contract for finished workout sessions.
#[async_trait]
pub trait WorkoutSessionRepository: Send + Sync {
    /// Record a finished session and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the workout does not exist,
    /// `StorageError::Serialization` if the summary fails validation, or other
    /// storage errors.
    async fn record_session(
        &self,
        summary: &WorkoutSessionSummary,
        recorded_at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// Fetch a recorded session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: i64) -> Result<WorkoutSessionRow, StorageError>;

    /// List recorded sessions for a workout, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures.
    async fn list_sessions(
        &self,
        workout_id: &WorkoutId,
        limit: u32,
    ) -> Result<Vec<WorkoutSessionRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    workouts: Arc<Mutex<HashMap<WorkoutId, Workout>>>,
    sessions: Arc<Mutex<Vec<WorkoutSessionRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl WorkoutRepository for InMemoryRepository {
    async fn upsert_workout(&self, workout: &Workout) -> Result<(), StorageError> {
        let mut guard = self.workouts.lock().map_err(poisoned)?;
        guard.insert(workout.id().clone(), workout.clone());
        Ok(())
    }

    async fn get_workout(&self, id: &WorkoutId) -> Result<Option<Workout>, StorageError> {
        let guard = self.workouts.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn list_workouts(&self, limit: u32) -> Result<Vec<Workout>, StorageError> {
        let guard = self.workouts.lock().map_err(poisoned)?;
        let mut workouts: Vec<Workout> = guard.values().cloned().collect();
        workouts.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        workouts.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(workouts)
    }
}

#[async_trait]
impl WorkoutSessionRepository for InMemoryRepository {
    async fn record_session(
        &self,
        summary: &WorkoutSessionSummary,
        recorded_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        revalidate(summary)?;
        {
            let workouts = self.workouts.lock().map_err(poisoned)?;
            if !workouts.contains_key(summary.workout_id()) {
                return Err(StorageError::NotFound);
            }
        }

        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let id = i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("session id overflow".into()))?
            + 1;
        guard.push(WorkoutSessionRow {
            id,
            summary: summary.clone(),
            recorded_at,
        });
        Ok(id)
    }

    async fn get_session(&self, id: i64) -> Result<WorkoutSessionRow, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_sessions(
        &self,
        workout_id: &WorkoutId,
        limit: u32,
    ) -> Result<Vec<WorkoutSessionRow>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut rows: Vec<WorkoutSessionRow> = guard
            .iter()
            .filter(|row| row.summary.workout_id() == workout_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub workouts: Arc<dyn WorkoutRepository>,
    pub sessions: Arc<dyn WorkoutSessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let workouts: Arc<dyn WorkoutRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn WorkoutSessionRepository> = Arc::new(repo);
        Self { workouts, sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fit_core::model::ExerciseId;
    use fit_core::time::fixed_now;

    fn build_workout(id: &str, created_offset: i64) -> Workout {
        Workout::new(
            WorkoutId::new(id),
            format!("Workout {id}"),
            vec![ExerciseId::new("E1"), ExerciseId::new("E2"), ExerciseId::new("E3")],
            fixed_now() + Duration::seconds(created_offset),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lists_workouts_oldest_first() {
        let repo = InMemoryRepository::new();
        repo.upsert_workout(&build_workout("B", 10)).await.unwrap();
        repo.upsert_workout(&build_workout("A", 0)).await.unwrap();

        let listed = repo.list_workouts(10).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|w| w.id().as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert!(repo.get_workout(&WorkoutId::new("C")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn records_sessions_newest_first() {
        let repo = InMemoryRepository::new();
        let workout = build_workout("W1", 0);
        repo.upsert_workout(&workout).await.unwrap();

        let first = WorkoutSessionSummary::new(workout.id().clone(), 60, 1, 3).unwrap();
        let second = WorkoutSessionSummary::new(workout.id().clone(), 90, 3, 3).unwrap();
        let id1 = repo.record_session(&first, fixed_now()).await.unwrap();
        let id2 = repo
            .record_session(&second, fixed_now() + Duration::minutes(5))
            .await
            .unwrap();

        let rows = repo.list_sessions(workout.id(), 10).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), [id2, id1]);
        assert_eq!(repo.get_session(id1).await.unwrap().summary, first);
    }

    #[tokio::test]
    async fn rejects_sessions_for_unknown_workouts() {
        let repo = InMemoryRepository::new();
        let summary = WorkoutSessionSummary::new(WorkoutId::new("ghost"), 60, 1, 3).unwrap();
        let err = repo.record_session(&summary, fixed_now()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
