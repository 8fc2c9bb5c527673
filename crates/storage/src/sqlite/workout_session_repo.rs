use chrono::{DateTime, Utc};
use fit_core::model::{WorkoutId, WorkoutSessionSummary};

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, map_session_row};
use crate::repository::{StorageError, WorkoutSessionRepository, WorkoutSessionRow, revalidate};

#[async_trait::async_trait]
impl WorkoutSessionRepository for SqliteRepository {
    async fn record_session(
        &self,
        summary: &WorkoutSessionSummary,
        recorded_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        revalidate(summary)?;

        let exists = sqlx::query("SELECT 1 FROM workouts WHERE id = ?1")
            .bind(summary.workout_id().as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
                INSERT INTO workout_sessions (
                    workout_id, duration_seconds, exercises_completed,
                    total_exercises, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(summary.workout_id().as_str())
        .bind(i64_from_u64("duration_seconds", summary.duration_seconds())?)
        .bind(i64::from(summary.exercises_completed()))
        .bind(i64::from(summary.total_exercises()))
        .bind(recorded_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_session(&self, id: i64) -> Result<WorkoutSessionRow, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, workout_id, duration_seconds, exercises_completed,
                    total_exercises, recorded_at
                FROM workout_sessions
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn list_sessions(
        &self,
        workout_id: &WorkoutId,
        limit: u32,
    ) -> Result<Vec<WorkoutSessionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, workout_id, duration_seconds, exercises_completed,
                    total_exercises, recorded_at
                FROM workout_sessions
                WHERE workout_id = ?1
                ORDER BY recorded_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(workout_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }
}
