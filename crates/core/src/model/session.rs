use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::model::{ExerciseId, WorkoutId};

/// Key of a durable slot, scoped to one workout.
///
/// Views without a workout identifier share the `default` scope.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SlotKey(String);

impl SlotKey {
    pub const DEFAULT_SCOPE: &'static str = "default";

    /// Slot holding the `PersistenceRecord` of a workout session.
    #[must_use]
    pub fn session(workout_id: Option<&WorkoutId>) -> Self {
        Self::scoped("workout-session", workout_id)
    }

    /// Slot holding the advisory timer mirror of a workout session.
    #[must_use]
    pub fn timer(workout_id: Option<&WorkoutId>) -> Self {
        Self::scoped("workout-timer", workout_id)
    }

    fn scoped(prefix: &str, workout_id: Option<&WorkoutId>) -> Self {
        let scope = workout_id.map_or(Self::DEFAULT_SCOPE, WorkoutId::as_str);
        Self(format!("{prefix}:{scope}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotKey({})", self.0)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-memory state of one workout attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    is_active: bool,
    completed: BTreeSet<ExerciseId>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate from a persisted record.
    ///
    /// Only active records are restored; anything else yields the default state.
    #[must_use]
    pub fn from_record(record: PersistenceRecord) -> Self {
        if !record.is_active {
            return Self::default();
        }
        Self {
            is_active: true,
            completed: record.completed_exercise_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<ExerciseId> {
        &self.completed
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn is_completed(&self, exercise_id: &ExerciseId) -> bool {
        self.completed.contains(exercise_id)
    }

    /// Mark the session active. Returns `false` if it already was.
    pub fn activate(&mut self) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        true
    }

    /// Flip membership of `exercise_id` in the completed set.
    ///
    /// Returns `None` when the session is inactive (nothing changes), otherwise
    /// whether the exercise is now completed.
    pub fn toggle(&mut self, exercise_id: &ExerciseId) -> Option<bool> {
        if !self.is_active {
            return None;
        }
        if self.completed.remove(exercise_id) {
            Some(false)
        } else {
            self.completed.insert(exercise_id.clone());
            Some(true)
        }
    }

    /// Reset to inactive with an empty completed set. Returns `false` if already clear.
    pub fn clear(&mut self) -> bool {
        let changed = self.is_active || !self.completed.is_empty();
        self.is_active = false;
        self.completed.clear();
        changed
    }

    #[must_use]
    pub fn to_record(&self, timestamp_ms: i64) -> PersistenceRecord {
        PersistenceRecord {
            is_active: self.is_active,
            completed_exercise_ids: self.completed.iter().cloned().collect(),
            timestamp: timestamp_ms,
        }
    }
}

/// JSON blob stored in the durable session slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceRecord {
    pub is_active: bool,
    #[serde(default)]
    pub completed_exercise_ids: Vec<ExerciseId>,
    /// Milliseconds since the Unix epoch at write time.
    #[serde(default)]
    pub timestamp: i64,
}

impl PersistenceRecord {
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the record cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` for malformed input.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
