use std::fmt;
use std::sync::Arc;

use fit_core::model::{ExerciseId, NavigationIntent, TimerState, Workout, WorkoutId};
use storage::slot::DurableSlot;
use tokio::sync::watch;

use super::finalizer::{CompletionFinalizer, FinishOutcome, FinishTrigger};
use super::guard::{GuardOutcome, GuardState, NavigationGuard, Navigator, UnloadDecision};
use super::store::SessionStore;
use super::timer::Timer;
use crate::Clock;
use crate::error::SessionError;
use crate::recorder::SessionRecorder;

/// Collaborators injected into every workout session.
#[derive(Clone)]
pub struct SessionDeps {
    pub slot: Arc<dyn DurableSlot>,
    pub navigator: Arc<dyn Navigator>,
    pub recorder: Arc<dyn SessionRecorder>,
    pub clock: Clock,
}

/// Snapshot the UI renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub is_active: bool,
    pub completed_exercise_ids: Vec<ExerciseId>,
    pub elapsed_seconds: u64,
    pub is_running: bool,
    pub confirmation_pending: bool,
}

/// Result of pressing the start/stop control.
#[derive(Debug)]
pub enum TimerToggle {
    Started,
    Finished(FinishOutcome),
}

/// One workout view's session: store, timer, guard and finalizer composed.
pub struct WorkoutSession {
    workout_id: Option<WorkoutId>,
    exercises: Vec<ExerciseId>,
    store: SessionStore,
    timer: Timer,
    guard: NavigationGuard,
    finalizer: CompletionFinalizer,
}

impl WorkoutSession {
    /// Open the session for a workout view, recovering an in-progress session
    /// from the durable slot.
    ///
    /// A restored active session re-arms the guard and resumes the timer from
    /// its mirrored value. Otherwise any stale timer mirror is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Timer` if a restored session cannot resume its
    /// timer outside a tokio runtime.
    pub fn open(
        workout_id: Option<WorkoutId>,
        exercises: Vec<ExerciseId>,
        deps: SessionDeps,
    ) -> Result<Self, SessionError> {
        let store = SessionStore::open(workout_id.clone(), Arc::clone(&deps.slot), deps.clock);
        let timer = Timer::new().with_mirror(deps.slot, workout_id.as_ref());
        let mut session = Self {
            workout_id,
            exercises,
            store,
            timer,
            guard: NavigationGuard::new(deps.navigator),
            finalizer: CompletionFinalizer::new(deps.recorder),
        };

        if session.store.is_active() {
            session.guard.arm(session.workout_id.clone());
            if let Some(mirrored) = session.timer.restore() {
                tracing::debug!(
                    elapsed_seconds = mirrored.elapsed_seconds,
                    "resuming mirrored timer"
                );
            }
            session.timer.start()?;
        } else {
            session.timer.reset();
        }
        Ok(session)
    }

    /// Open the session for a catalog workout.
    ///
    /// # Errors
    ///
    /// See [`WorkoutSession::open`].
    pub fn for_workout(workout: &Workout, deps: SessionDeps) -> Result<Self, SessionError> {
        Self::open(
            Some(workout.id().clone()),
            workout.exercises().to_vec(),
            deps,
        )
    }

    #[must_use]
    pub fn workout_id(&self) -> Option<&WorkoutId> {
        self.workout_id.as_ref()
    }

    #[must_use]
    pub fn total_exercises(&self) -> usize {
        self.exercises.len()
    }

    #[must_use]
    pub fn exercises(&self) -> &[ExerciseId] {
        &self.exercises
    }

    /// Swap in the exercise list the view currently renders.
    pub fn replace_exercises(&mut self, exercises: Vec<ExerciseId>) {
        self.exercises = exercises;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }

    #[must_use]
    pub fn guard_state(&self) -> &GuardState {
        self.guard.state()
    }

    #[must_use]
    pub fn pending_navigation(&self) -> Option<&NavigationIntent> {
        self.guard.pending()
    }

    #[must_use]
    pub fn subscribe_timer(&self) -> watch::Receiver<TimerState> {
        self.timer.subscribe()
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        let timer = self.timer.state();
        SessionView {
            is_active: self.store.is_active(),
            completed_exercise_ids: self.store.completed().iter().cloned().collect(),
            elapsed_seconds: timer.elapsed_seconds,
            is_running: timer.is_running,
            confirmation_pending: self.guard.is_confirmation_pending(),
        }
    }

    /// Start the timer, arm the guard and activate the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Timer` if no runtime is available (nothing
    /// changes), or `SessionError::Slot` if the session could not be persisted.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.timer.start()?;
        self.guard.arm(self.workout_id.clone());
        self.store.start()
    }

    /// Start a session, or finish the active one.
    ///
    /// # Errors
    ///
    /// See [`WorkoutSession::start`]. Finishing never fails.
    pub async fn toggle_timer(&mut self) -> Result<TimerToggle, SessionError> {
        if self.store.is_active() {
            let outcome = self.finish(FinishTrigger::TimerStopped).await;
            return Ok(TimerToggle::Finished(outcome));
        }
        self.start()?;
        Ok(TimerToggle::Started)
    }

    /// End the session and record its summary. Local state is cleared on
    /// every path.
    pub async fn finish(&mut self, trigger: FinishTrigger) -> FinishOutcome {
        self.guard.disarm();
        self.finalizer
            .finish(
                trigger,
                &mut self.store,
                &mut self.timer,
                &self.exercises,
            )
            .await
    }

    /// Mark or unmark an exercise. `Ok(None)` while no session is active.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownExercise` for an id outside this
    /// workout's exercise list, or `SessionError::Slot` if the toggle could not
    /// be persisted.
    pub fn toggle_exercise(
        &mut self,
        exercise_id: &ExerciseId,
    ) -> Result<Option<bool>, SessionError> {
        if self.store.is_active() && !self.exercises.contains(exercise_id) {
            return Err(SessionError::UnknownExercise(exercise_id.clone()));
        }
        self.store.toggle_exercise(exercise_id)
    }

    /// Navigate through the guard.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Navigation` if a pass-through navigation fails.
    pub fn navigate(&mut self, intent: NavigationIntent) -> Result<GuardOutcome, SessionError> {
        Ok(self.guard.attempt_navigate(intent)?)
    }

    /// The user confirmed leaving: finish the session, then run the
    /// intercepted navigation. Returns `Ok(None)` when nothing was pending.
    ///
    /// The finish is not rolled back if the navigation then fails.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NavigationAfterFinish`, carrying the finish
    /// outcome, if the deferred navigation fails. It is not retried.
    pub async fn confirm_leave(&mut self) -> Result<Option<FinishOutcome>, SessionError> {
        let Some(intent) = self.guard.take_pending() else {
            return Ok(None);
        };
        let outcome = self.finish(FinishTrigger::NavigationConfirmed).await;

        if let Err(source) = self.guard.dispatch(&intent) {
            tracing::error!(%intent, error = %source, "deferred navigation failed after finish");
            return Err(SessionError::NavigationAfterFinish {
                outcome: Box::new(outcome),
                source,
            });
        }
        Ok(Some(outcome))
    }

    /// The user chose to stay. Returns whether a navigation was discarded.
    pub fn cancel_leave(&mut self) -> bool {
        self.guard.cancel()
    }

    #[must_use]
    pub fn before_unload(&self) -> UnloadDecision {
        self.guard.before_unload()
    }
}

impl fmt::Debug for WorkoutSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkoutSession")
            .field("workout_id", &self.workout_id)
            .field("exercises", &self.exercises.len())
            .field("store", &self.store)
            .field("timer", &self.timer)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
