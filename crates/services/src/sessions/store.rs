use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use fit_core::model::{ExerciseId, PersistenceRecord, SessionState, SlotKey, WorkoutId};
use storage::slot::DurableSlot;

use crate::Clock;
use crate::error::SessionError;

/// Single source of truth for whether a workout is in progress and which of
/// its exercises are done.
///
/// Every mutation that leaves the session active is mirrored to the durable
/// slot before returning, so a reload resumes exactly where the user was.
pub struct SessionStore {
    workout_id: Option<WorkoutId>,
    key: SlotKey,
    state: SessionState,
    slot: Arc<dyn DurableSlot>,
    clock: Clock,
}

impl SessionStore {
    /// Create a store with default (inactive) state. Call [`SessionStore::restore`]
    /// to hydrate from the slot.
    #[must_use]
    pub fn new(workout_id: Option<WorkoutId>, slot: Arc<dyn DurableSlot>) -> Self {
        let key = SlotKey::session(workout_id.as_ref());
        Self {
            workout_id,
            key,
            state: SessionState::new(),
            slot,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Create a store and hydrate it from the slot in one step.
    #[must_use]
    pub fn open(workout_id: Option<WorkoutId>, slot: Arc<dyn DurableSlot>, clock: Clock) -> Self {
        let mut store = Self::new(workout_id, slot).with_clock(clock);
        store.restore();
        store
    }

    #[must_use]
    pub fn workout_id(&self) -> Option<&WorkoutId> {
        self.workout_id.as_ref()
    }

    #[must_use]
    pub fn key(&self) -> &SlotKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<ExerciseId> {
        self.state.completed()
    }

    /// Hydrate from the durable slot. Returns whether an active session was restored.
    ///
    /// A missing, unreadable, malformed or inactive record leaves the default state.
    pub fn restore(&mut self) -> bool {
        self.state = match self.slot.get(&self.key) {
            Ok(Some(raw)) => match PersistenceRecord::decode(&raw) {
                Ok(record) => SessionState::from_record(record),
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "discarding malformed session record");
                    SessionState::new()
                }
            },
            Ok(None) => SessionState::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "session slot unreadable");
                SessionState::new()
            }
        };

        if self.state.is_active() {
            tracing::info!(
                key = %self.key,
                completed = self.state.completed_count(),
                "restored active workout session"
            );
        }
        self.state.is_active()
    }

    /// Activate the session. Already active sessions are only re-persisted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the slot write fails; the in-memory state is
    /// active regardless.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state.activate() {
            tracing::debug!(key = %self.key, "workout session started");
        }
        self.persist()
    }

    /// Flip whether `exercise_id` is completed.
    ///
    /// Returns `Ok(None)` without touching anything when the session is not active,
    /// otherwise whether the exercise is now completed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the slot write fails; the in-memory toggle is kept.
    pub fn toggle_exercise(&mut self, exercise_id: &ExerciseId) -> Result<Option<bool>, SessionError> {
        let Some(completed) = self.state.toggle(exercise_id) else {
            tracing::debug!(key = %self.key, exercise_id = %exercise_id, "toggle ignored: session inactive");
            return Ok(None);
        };
        self.persist()?;
        Ok(Some(completed))
    }

    /// End the session: inactive, nothing completed, slot deleted.
    ///
    /// Idempotent and infallible. Returns whether there was anything to clear.
    pub fn finish(&mut self) -> bool {
        let cleared = self.state.clear();
        if let Err(e) = self.slot.delete(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "failed to delete session record");
        }
        cleared
    }

    fn persist(&self) -> Result<(), SessionError> {
        let raw = self.state.to_record(self.clock.now_millis()).encode()?;
        self.slot.set(&self.key, &raw)?;
        Ok(())
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fit_core::time::{FIXED_TEST_TIMESTAMP, fixed_clock};
    use storage::repository::StorageError;
    use storage::slot::InMemorySlot;

    fn ex(id: &str) -> ExerciseId {
        ExerciseId::new(id)
    }

    fn store_with(slot: &InMemorySlot) -> SessionStore {
        SessionStore::new(Some(WorkoutId::new("W1")), Arc::new(slot.clone())).with_clock(fixed_clock())
    }

    fn decoded(slot: &InMemorySlot, key: &SlotKey) -> Option<SessionState> {
        slot.get(key)
            .unwrap()
            .map(|raw| SessionState::from_record(PersistenceRecord::decode(&raw).unwrap()))
    }

    #[test]
    fn slot_mirrors_every_active_mutation() {
        let slot = InMemorySlot::new();
        let mut store = store_with(&slot);
        let key = store.key().clone();

        store.start().unwrap();
        assert_eq!(decoded(&slot, &key).as_ref(), Some(store.state()));

        for id in ["E1", "E2", "E1", "E3"] {
            store.toggle_exercise(&ex(id)).unwrap();
            assert_eq!(decoded(&slot, &key).as_ref(), Some(store.state()));
        }
        assert!(store.completed().contains(&ex("E2")));
        assert!(!store.completed().contains(&ex("E1")));

        let raw = slot.get(&key).unwrap().unwrap();
        let record = PersistenceRecord::decode(&raw).unwrap();
        assert_eq!(record.timestamp, FIXED_TEST_TIMESTAMP * 1000);
    }

    #[test]
    fn toggle_before_start_is_a_no_op() {
        let slot = InMemorySlot::new();
        let mut store = store_with(&slot);

        assert_eq!(store.toggle_exercise(&ex("E1")).unwrap(), None);
        assert!(store.completed().is_empty());
        assert!(slot.is_empty());
    }

    #[test]
    fn finish_twice_matches_finish_once() {
        let slot = InMemorySlot::new();
        let mut store = store_with(&slot);
        store.start().unwrap();
        store.toggle_exercise(&ex("E1")).unwrap();

        assert!(store.finish());
        let once = store.state().clone();
        assert!(!store.finish());

        assert_eq!(store.state(), &once);
        assert!(!store.is_active());
        assert!(store.completed().is_empty());
        assert!(slot.get(store.key()).unwrap().is_none());
    }

    #[test]
    fn restore_hydrates_active_record() {
        let slot = InMemorySlot::new();
        let key = SlotKey::session(Some(&WorkoutId::new("W1")));
        slot.set(
            &key,
            r#"{"isActive":true,"completedExerciseIds":["a","b"],"timestamp":1700000000000}"#,
        )
        .unwrap();

        let store = SessionStore::open(Some(WorkoutId::new("W1")), Arc::new(slot), fixed_clock());
        assert!(store.is_active());
        let completed: Vec<&str> = store.completed().iter().map(ExerciseId::as_str).collect();
        assert_eq!(completed, ["a", "b"]);
    }

    #[test]
    fn restore_from_absent_or_malformed_slot_yields_defaults() {
        let slot = InMemorySlot::new();
        let mut store = store_with(&slot);
        assert!(!store.restore());
        assert_eq!(store.state(), &SessionState::new());

        slot.set(store.key(), "{not json").unwrap();
        assert!(!store.restore());
        assert_eq!(store.state(), &SessionState::new());
    }

    #[test]
    fn sessions_are_scoped_per_workout() {
        let slot = InMemorySlot::new();
        let mut first = store_with(&slot);
        first.start().unwrap();

        let other = SessionStore::open(Some(WorkoutId::new("W2")), Arc::new(slot.clone()), fixed_clock());
        assert!(!other.is_active());

        let anonymous = SessionStore::open(None, Arc::new(slot), fixed_clock());
        assert_eq!(anonymous.key().as_str(), "workout-session:default");
        assert!(!anonymous.is_active());
    }

    struct BrokenSlot;

    impl DurableSlot for BrokenSlot {
        fn get(&self, _key: &SlotKey) -> Result<Option<String>, StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }

        fn set(&self, _key: &SlotKey, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }

        fn delete(&self, _key: &SlotKey) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }
    }

    #[test]
    fn slot_failures_keep_memory_consistent() {
        let mut store = SessionStore::open(Some(WorkoutId::new("W1")), Arc::new(BrokenSlot), fixed_clock());
        assert!(!store.is_active());

        assert!(matches!(store.start(), Err(SessionError::Slot(_))));
        assert!(store.is_active());

        assert!(store.toggle_exercise(&ex("E1")).is_err());
        assert!(store.completed().contains(&ex("E1")));

        assert!(store.finish());
        assert!(!store.is_active());
    }
}
