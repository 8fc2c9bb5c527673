use std::path::Path;
use std::sync::Arc;

use fit_core::model::{ExerciseId, Workout, WorkoutId};
use storage::repository::{Storage, WorkoutRepository};
use storage::slot::{DurableSlot, FileSlot};

use crate::Clock;
use crate::error::AppServicesError;
use crate::recorder::{HttpSessionRecorder, RepositoryRecorder, SessionRecorder};
use crate::sessions::{HistoryService, Navigator, SessionDeps, WorkoutSession};

const DEFAULT_WORKOUT_ID: &str = "quick-start";
const DEFAULT_WORKOUT_NAME: &str = "Quick Start";
const DEFAULT_EXERCISES: [&str; 3] = ["warm-up", "main-set", "cool-down"];

/// Assembles app-facing services and resolves the workout to run.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    workout: Workout,
    created_default: bool,
    slot: Arc<dyn DurableSlot>,
    recorder: Arc<dyn SessionRecorder>,
    history: Arc<HistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and a file-backed durable slot.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization, slot setup or
    /// workout resolution fails.
    pub async fn new_sqlite(
        db_url: &str,
        state_dir: &Path,
        clock: Clock,
        preferred_workout: Option<WorkoutId>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let slot: Arc<dyn DurableSlot> = Arc::new(FileSlot::open(state_dir)?);
        Self::from_storage(storage, slot, clock, preferred_workout).await
    }

    /// Build services over already constructed storage.
    ///
    /// Sessions are recorded through the HTTP backend when `FIT_API_BASE_URL`
    /// and `FIT_API_TOKEN` are set, otherwise into local storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if workout resolution fails.
    pub async fn from_storage(
        storage: Storage,
        slot: Arc<dyn DurableSlot>,
        clock: Clock,
        preferred_workout: Option<WorkoutId>,
    ) -> Result<Self, AppServicesError> {
        let (workout, created_default) =
            ensure_workout(storage.workouts.as_ref(), clock, preferred_workout).await?;

        let http = HttpSessionRecorder::from_env(clock);
        let recorder: Arc<dyn SessionRecorder> = if http.enabled() {
            tracing::info!("recording workout sessions through the remote API");
            Arc::new(http)
        } else {
            tracing::info!("recording workout sessions into local storage");
            Arc::new(RepositoryRecorder::new(clock, Arc::clone(&storage.sessions)))
        };
        let history = Arc::new(HistoryService::new(Arc::clone(&storage.sessions)));

        Ok(Self {
            clock,
            workout,
            created_default,
            slot,
            recorder,
            history,
        })
    }

    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    #[must_use]
    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    /// Whether the workout was created because storage had none.
    #[must_use]
    pub fn created_default(&self) -> bool {
        self.created_default
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }

    /// Open the session controller for the resolved workout.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Session` if a restored session cannot resume.
    pub fn open_session(
        &self,
        navigator: Arc<dyn Navigator>,
    ) -> Result<WorkoutSession, AppServicesError> {
        let deps = SessionDeps {
            slot: Arc::clone(&self.slot),
            navigator,
            recorder: Arc::clone(&self.recorder),
            clock: self.clock,
        };
        Ok(WorkoutSession::for_workout(&self.workout, deps)?)
    }
}

async fn ensure_workout(
    workouts: &dyn WorkoutRepository,
    clock: Clock,
    preferred: Option<WorkoutId>,
) -> Result<(Workout, bool), AppServicesError> {
    if let Some(id) = preferred {
        return match workouts.get_workout(&id).await? {
            Some(workout) => Ok((workout, false)),
            None => Err(AppServicesError::UnknownWorkout(id.to_string())),
        };
    }

    if let Some(first) = workouts.list_workouts(1).await?.into_iter().next() {
        return Ok((first, false));
    }

    let workout = Workout::new(
        WorkoutId::new(DEFAULT_WORKOUT_ID),
        DEFAULT_WORKOUT_NAME,
        DEFAULT_EXERCISES.iter().copied().map(ExerciseId::new).collect(),
        clock.now(),
    )?;
    workouts.upsert_workout(&workout).await?;
    tracing::info!(workout_id = %workout.id(), "created default workout");

    Ok((workout, true))
}
