use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the consolidated schema migration.
///
/// Creates workouts, their ordered exercise lists, recorded sessions and indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if is_applied(pool, 1).await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS workouts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL CHECK (length(trim(name)) > 0),
                created_at TEXT NOT NULL
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS workout_exercises (
                workout_id TEXT NOT NULL,
                position INTEGER NOT NULL CHECK (position >= 0),
                exercise_id TEXT NOT NULL,
                PRIMARY KEY (workout_id, position),
                UNIQUE (workout_id, exercise_id),
                FOREIGN KEY (workout_id) REFERENCES workouts(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS workout_sessions (
                id INTEGER PRIMARY KEY,
                workout_id TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL CHECK (duration_seconds >= 1),
                exercises_completed INTEGER NOT NULL CHECK (exercises_completed >= 0),
                total_exercises INTEGER NOT NULL CHECK (total_exercises >= 1),
                recorded_at TEXT NOT NULL,
                CHECK (exercises_completed <= total_exercises),
                FOREIGN KEY (workout_id) REFERENCES workouts(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_workout_sessions_workout_recorded
                ON workout_sessions (workout_id, recorded_at);
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(1_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(version = 1, "sqlite schema migrated");

    Ok(())
}
