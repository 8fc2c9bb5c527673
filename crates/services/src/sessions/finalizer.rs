use std::fmt;
use std::sync::Arc;

use fit_core::model::{ExerciseId, SummaryError, WorkoutSessionSummary};

use super::store::SessionStore;
use super::timer::Timer;
use crate::error::RecordError;
use crate::recorder::{RecordedSession, SessionRecorder};

/// What ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishTrigger {
    TimerStopped,
    NavigationConfirmed,
}

impl fmt::Display for FinishTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishTrigger::TimerStopped => f.write_str("timer_stopped"),
            FinishTrigger::NavigationConfirmed => f.write_str("navigation_confirmed"),
        }
    }
}

/// Result of one finish attempt. Local state is cleared in every case.
#[derive(Debug)]
pub enum FinishOutcome {
    /// No session was active; nothing was recorded.
    NotActive,
    Recorded {
        summary: WorkoutSessionSummary,
        record: RecordedSession,
    },
    /// The summary violated a constraint and was not sent.
    Skipped { reason: SummaryError },
    /// The recorder rejected or failed the write.
    RecordFailed {
        summary: WorkoutSessionSummary,
        error: RecordError,
    },
}

impl FinishOutcome {
    /// Non-blocking notification to show the user, if any.
    #[must_use]
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            FinishOutcome::Recorded { .. } => Some("Workout saved"),
            FinishOutcome::RecordFailed { .. } => {
                Some("Workout finished, but it could not be saved")
            }
            FinishOutcome::NotActive | FinishOutcome::Skipped { .. } => None,
        }
    }

    #[must_use]
    pub fn summary(&self) -> Option<&WorkoutSessionSummary> {
        match self {
            FinishOutcome::Recorded { summary, .. } | FinishOutcome::RecordFailed { summary, .. } => {
                Some(summary)
            }
            FinishOutcome::NotActive | FinishOutcome::Skipped { .. } => None,
        }
    }
}

/// Turns the session store and timer into a summary and records it once.
#[derive(Clone)]
pub struct CompletionFinalizer {
    recorder: Arc<dyn SessionRecorder>,
}

impl CompletionFinalizer {
    #[must_use]
    pub fn new(recorder: Arc<dyn SessionRecorder>) -> Self {
        Self { recorder }
    }

    /// Finish the active session.
    ///
    /// The timer is stopped and the store cleared before the recorder is
    /// awaited, so a second call finds nothing active and records nothing.
    /// Only completed ids that appear in `exercises` are counted.
    pub async fn finish(
        &self,
        trigger: FinishTrigger,
        store: &mut SessionStore,
        timer: &mut Timer,
        exercises: &[ExerciseId],
    ) -> FinishOutcome {
        let duration_seconds = timer.stop();
        if !store.is_active() {
            store.finish();
            return FinishOutcome::NotActive;
        }

        let workout_id = store.workout_id().cloned();
        let exercises_completed = store
            .completed()
            .iter()
            .filter(|&id| exercises.contains(id))
            .count();
        let total_exercises = exercises.len();
        store.finish();

        let summary = match WorkoutSessionSummary::from_counts(
            workout_id,
            duration_seconds,
            exercises_completed,
            total_exercises,
        ) {
            Ok(summary) => summary,
            Err(reason) => {
                tracing::error!(
                    %trigger,
                    key = %store.key(),
                    duration_seconds,
                    exercises_completed,
                    total_exercises,
                    %reason,
                    "invalid workout summary, not recording"
                );
                return FinishOutcome::Skipped { reason };
            }
        };

        match self.recorder.record(&summary).await {
            Ok(record) => {
                tracing::info!(
                    %trigger,
                    workout_id = %summary.workout_id(),
                    session_id = record.id,
                    duration_seconds,
                    exercises_completed,
                    total_exercises,
                    "workout session recorded"
                );
                FinishOutcome::Recorded { summary, record }
            }
            Err(error) => {
                tracing::error!(
                    %trigger,
                    workout_id = %summary.workout_id(),
                    %error,
                    "failed to record workout session"
                );
                FinishOutcome::RecordFailed { summary, error }
            }
        }
    }
}
