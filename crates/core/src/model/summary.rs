use thiserror::Error;

use crate::model::WorkoutId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("session is not bound to a workout")]
    MissingWorkout,

    #[error("duration must be at least one second")]
    DurationTooShort,

    #[error("workout has no exercises")]
    NoExercises,

    #[error("completed exercises ({completed}) exceed total ({total})")]
    CompletedExceedsTotal { completed: u32, total: u32 },

    #[error("{field} does not fit in u32: {value}")]
    CountOverflow { field: &'static str, value: usize },
}

/// Result of one finished workout attempt, handed to the session recorder.
///
/// Construction enforces `duration_seconds >= 1`, `total_exercises >= 1` and
/// `exercises_completed <= total_exercises`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutSessionSummary {
    workout_id: WorkoutId,
    duration_seconds: u64,
    exercises_completed: u32,
    total_exercises: u32,
}

impl WorkoutSessionSummary {
    /// Validate and build a summary.
    ///
    /// # Errors
    ///
    /// Returns the first `SummaryError` constraint that is violated.
    pub fn new(
        workout_id: WorkoutId,
        duration_seconds: u64,
        exercises_completed: u32,
        total_exercises: u32,
    ) -> Result<Self, SummaryError> {
        if workout_id.as_str().trim().is_empty() {
            return Err(SummaryError::MissingWorkout);
        }
        if duration_seconds < 1 {
            return Err(SummaryError::DurationTooShort);
        }
        if total_exercises < 1 {
            return Err(SummaryError::NoExercises);
        }
        if exercises_completed > total_exercises {
            return Err(SummaryError::CompletedExceedsTotal {
                completed: exercises_completed,
                total: total_exercises,
            });
        }

        Ok(Self {
            workout_id,
            duration_seconds,
            exercises_completed,
            total_exercises,
        })
    }

    /// Build a summary from raw in-memory counts.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::MissingWorkout` when `workout_id` is `None`,
    /// `SummaryError::CountOverflow` if a count does not fit in `u32`, and any
    /// constraint error from [`WorkoutSessionSummary::new`].
    pub fn from_counts(
        workout_id: Option<WorkoutId>,
        duration_seconds: u64,
        exercises_completed: usize,
        total_exercises: usize,
    ) -> Result<Self, SummaryError> {
        let workout_id = workout_id.ok_or(SummaryError::MissingWorkout)?;
        let completed = u32::try_from(exercises_completed).map_err(|_| {
            SummaryError::CountOverflow {
                field: "exercises_completed",
                value: exercises_completed,
            }
        })?;
        let total = u32::try_from(total_exercises).map_err(|_| SummaryError::CountOverflow {
            field: "total_exercises",
            value: total_exercises,
        })?;
        Self::new(workout_id, duration_seconds, completed, total)
    }

    #[must_use]
    pub fn workout_id(&self) -> &WorkoutId {
        &self.workout_id
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    #[must_use]
    pub fn exercises_completed(&self) -> u32 {
        self.exercises_completed
    }

    #[must_use]
    pub fn total_exercises(&self) -> u32 {
        self.total_exercises
    }

    /// Share of the workout's exercises that were completed, in `0.0..=1.0`.
    #[must_use]
    pub fn completion_ratio(&self) -> f64 {
        f64::from(self.exercises_completed) / f64::from(self.total_exercises)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w1() -> WorkoutId {
        WorkoutId::new("W1")
    }

    #[test]
    fn accepts_partial_completion() {
        let summary = WorkoutSessionSummary::new(w1(), 95, 2, 3).unwrap();
        assert_eq!(summary.exercises_completed(), 2);
        assert!((summary.completion_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_constraint_violations() {
        assert_eq!(
            WorkoutSessionSummary::new(w1(), 0, 0, 3).unwrap_err(),
            SummaryError::DurationTooShort
        );
        assert_eq!(
            WorkoutSessionSummary::new(w1(), 10, 0, 0).unwrap_err(),
            SummaryError::NoExercises
        );
        assert_eq!(
            WorkoutSessionSummary::new(w1(), 10, 4, 3).unwrap_err(),
            SummaryError::CompletedExceedsTotal {
                completed: 4,
                total: 3
            }
        );
        assert_eq!(
            WorkoutSessionSummary::new(WorkoutId::new(" "), 10, 1, 3).unwrap_err(),
            SummaryError::MissingWorkout
        );
    }

    #[test]
    fn from_counts_requires_workout() {
        let err = WorkoutSessionSummary::from_counts(None, 10, 1, 3).unwrap_err();
        assert_eq!(err, SummaryError::MissingWorkout);

        let ok = WorkoutSessionSummary::from_counts(Some(w1()), 10, 3, 3).unwrap();
        assert_eq!(ok.total_exercises(), 3);
    }
}
