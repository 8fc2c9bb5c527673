use chrono::{DateTime, Utc};
use fit_core::model::{ExerciseId, Workout, WorkoutId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{StorageError, WorkoutRepository};

impl SqliteRepository {
    async fn load_exercises(&self, workout_id: &str) -> Result<Vec<ExerciseId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT exercise_id
                FROM workout_exercises
                WHERE workout_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(workout_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("exercise_id")
                    .map(ExerciseId::new)
                    .map_err(ser)
            })
            .collect()
    }

    async fn map_workout_row(&self, row: &SqliteRow) -> Result<Workout, StorageError> {
        let id: String = row.try_get("id").map_err(ser)?;
        let name: String = row.try_get("name").map_err(ser)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
        let exercises = self.load_exercises(&id).await?;
        Workout::new(WorkoutId::new(id), name, exercises, created_at).map_err(ser)
    }
}

#[async_trait::async_trait]
impl WorkoutRepository for SqliteRepository {
    async fn upsert_workout(&self, workout: &Workout) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO workouts (id, name, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name
            ",
        )
        .bind(workout.id().as_str())
        .bind(workout.name())
        .bind(workout.created_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM workout_exercises WHERE workout_id = ?1")
            .bind(workout.id().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, exercise) in workout.exercises().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO workout_exercises (workout_id, position, exercise_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(workout.id().as_str())
            .bind(position)
            .bind(exercise.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_workout(&self, id: &WorkoutId) -> Result<Option<Workout>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, created_at
            FROM workouts
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => Ok(Some(self.map_workout_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_workouts(&self, limit: u32) -> Result<Vec<Workout>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, created_at
            FROM workouts
            ORDER BY created_at ASC, id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut workouts = Vec::with_capacity(rows.len());
        for row in &rows {
            workouts.push(self.map_workout_row(row).await?);
        }
        Ok(workouts)
    }
}
