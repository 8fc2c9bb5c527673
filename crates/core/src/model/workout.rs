use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ExerciseId, WorkoutId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkoutError {
    #[error("workout name cannot be empty")]
    EmptyName,

    #[error("workout name is too long ({len} > {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("exercise {0} appears more than once")]
    DuplicateExercise(ExerciseId),
}

//
// ─── WORKOUT ───────────────────────────────────────────────────────────────────
//

/// A named, ordered list of exercises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workout {
    id: WorkoutId,
    name: String,
    exercises: Vec<ExerciseId>,
    created_at: DateTime<Utc>,
}

impl Workout {
    pub const MAX_NAME_LEN: usize = 120;

    /// Creates a workout, trimming the name.
    ///
    /// An empty exercise list is allowed; sessions for such a workout cannot be recorded.
    ///
    /// # Errors
    ///
    /// Returns `WorkoutError::EmptyName` for a blank name, `WorkoutError::NameTooLong`
    /// past `MAX_NAME_LEN` characters, and `WorkoutError::DuplicateExercise` if an
    /// exercise is listed twice.
    pub fn new(
        id: WorkoutId,
        name: impl Into<String>,
        exercises: Vec<ExerciseId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, WorkoutError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(WorkoutError::EmptyName);
        }
        let len = name.chars().count();
        if len > Self::MAX_NAME_LEN {
            return Err(WorkoutError::NameTooLong {
                len,
                max: Self::MAX_NAME_LEN,
            });
        }

        let mut seen = HashSet::with_capacity(exercises.len());
        for exercise in &exercises {
            if !seen.insert(exercise) {
                return Err(WorkoutError::DuplicateExercise(exercise.clone()));
            }
        }

        Ok(Self {
            id,
            name,
            exercises,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &WorkoutId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn exercises(&self) -> &[ExerciseId] {
        &self.exercises
    }

    #[must_use]
    pub fn total_exercises(&self) -> usize {
        self.exercises.len()
    }

    #[must_use]
    pub fn contains(&self, exercise_id: &ExerciseId) -> bool {
        self.exercises.contains(exercise_id)
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn exercises(ids: &[&str]) -> Vec<ExerciseId> {
        ids.iter().copied().map(ExerciseId::new).collect()
    }

    #[test]
    fn trims_name_and_keeps_order() {
        let workout = Workout::new(
            WorkoutId::new("W1"),
            "  Leg day ",
            exercises(&["squat", "lunge", "calf"]),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(workout.name(), "Leg day");
        assert_eq!(workout.exercises()[1].as_str(), "lunge");
        assert_eq!(workout.total_exercises(), 3);
    }

    #[test]
    fn rejects_blank_name_and_duplicates() {
        let err = Workout::new(WorkoutId::new("W1"), " ", Vec::new(), fixed_now()).unwrap_err();
        assert_eq!(err, WorkoutError::EmptyName);

        let err = Workout::new(
            WorkoutId::new("W1"),
            "Push",
            exercises(&["E1", "E2", "E1"]),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, WorkoutError::DuplicateExercise(ExerciseId::new("E1")));
    }
}
