use fit_core::model::{WorkoutId, WorkoutSessionSummary};
use sqlx::Row;

use crate::repository::{StorageError, WorkoutSessionRow};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn i64_from_u64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<WorkoutSessionRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let workout_id = WorkoutId::new(row.try_get::<String, _>("workout_id").map_err(ser)?);
    let duration = u64_from_i64(
        "duration_seconds",
        row.try_get::<i64, _>("duration_seconds").map_err(ser)?,
    )?;
    let completed = u32_from_i64(
        "exercises_completed",
        row.try_get::<i64, _>("exercises_completed").map_err(ser)?,
    )?;
    let total = u32_from_i64(
        "total_exercises",
        row.try_get::<i64, _>("total_exercises").map_err(ser)?,
    )?;
    let recorded_at = row.try_get("recorded_at").map_err(ser)?;

    let summary = WorkoutSessionSummary::new(workout_id, duration, completed, total).map_err(ser)?;
    Ok(WorkoutSessionRow {
        id,
        summary,
        recorded_at,
    })
}
