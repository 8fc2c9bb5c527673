use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fit_core::model::WorkoutSessionSummary;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use storage::repository::WorkoutSessionRepository;

use crate::Clock;
use crate::error::RecordError;

/// Acknowledgement returned by a recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSession {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
}

/// The single write performed when a workout session finishes.
#[async_trait]
pub trait SessionRecorder: Send + Sync {
    /// Persist a finished session.
    ///
    /// Implementations re-validate the summary and perform their own
    /// ownership checks.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if the session could not be recorded.
    async fn record(&self, summary: &WorkoutSessionSummary) -> Result<RecordedSession, RecordError>;
}

/// Records sessions into the local workout session repository.
#[derive(Clone)]
pub struct RepositoryRecorder {
    clock: Clock,
    sessions: Arc<dyn WorkoutSessionRepository>,
}

impl RepositoryRecorder {
    #[must_use]
    pub fn new(clock: Clock, sessions: Arc<dyn WorkoutSessionRepository>) -> Self {
        Self { clock, sessions }
    }
}

#[async_trait]
impl SessionRecorder for RepositoryRecorder {
    async fn record(&self, summary: &WorkoutSessionSummary) -> Result<RecordedSession, RecordError> {
        let recorded_at = self.clock.now();
        let id = self.sessions.record_session(summary, recorded_at).await?;
        Ok(RecordedSession { id, recorded_at })
    }
}

#[derive(Clone, Debug)]
pub struct HttpRecorderConfig {
    pub base_url: String,
    pub api_token: String,
}

impl HttpRecorderConfig {
    /// Read `FIT_API_BASE_URL` and `FIT_API_TOKEN`; both must be non-empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("FIT_API_BASE_URL").ok()?;
        let api_token = env::var("FIT_API_TOKEN").ok()?;
        if base_url.trim().is_empty() || api_token.trim().is_empty() {
            return None;
        }
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// Records sessions through a remote backend's `POST /workout-sessions`.
#[derive(Clone)]
pub struct HttpSessionRecorder {
    client: Client,
    clock: Clock,
    config: Option<HttpRecorderConfig>,
}

impl HttpSessionRecorder {
    #[must_use]
    pub fn from_env(clock: Clock) -> Self {
        Self::new(clock, HttpRecorderConfig::from_env())
    }

    #[must_use]
    pub fn new(clock: Clock, config: Option<HttpRecorderConfig>) -> Self {
        Self {
            client: Client::new(),
            clock,
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl SessionRecorder for HttpSessionRecorder {
    async fn record(&self, summary: &WorkoutSessionSummary) -> Result<RecordedSession, RecordError> {
        let config = self.config.as_ref().ok_or(RecordError::Disabled)?;

        let url = format!("{}/workout-sessions", config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_token)
            .json(&RecordRequest::from(summary))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RecordError::HttpStatus(response.status()));
        }

        let body: RecordResponse = response.json().await?;
        Ok(RecordedSession {
            id: body.id,
            recorded_at: self.clock.now(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRequest<'a> {
    workout_id: &'a str,
    duration_seconds: u64,
    exercises_completed: u32,
    total_exercises: u32,
}

impl<'a> From<&'a WorkoutSessionSummary> for RecordRequest<'a> {
    fn from(summary: &'a WorkoutSessionSummary) -> Self {
        Self {
            workout_id: summary.workout_id().as_str(),
            duration_seconds: summary.duration_seconds(),
            exercises_completed: summary.exercises_completed(),
            total_exercises: summary.total_exercises(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fit_core::model::{ExerciseId, Workout, WorkoutId};
    use fit_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, WorkoutRepository};

    #[test]
    fn request_body_uses_camel_case() {
        let summary = WorkoutSessionSummary::new(WorkoutId::new("W1"), 95, 2, 3).unwrap();
        let body = serde_json::to_value(RecordRequest::from(&summary)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "workoutId": "W1",
                "durationSeconds": 95,
                "exercisesCompleted": 2,
                "totalExercises": 3
            })
        );
    }

    #[tokio::test]
    async fn unconfigured_http_recorder_is_disabled() {
        let recorder = HttpSessionRecorder::new(fixed_clock(), None);
        assert!(!recorder.enabled());
        let summary = WorkoutSessionSummary::new(WorkoutId::new("W1"), 10, 0, 1).unwrap();
        assert!(matches!(
            recorder.record(&summary).await,
            Err(RecordError::Disabled)
        ));
    }

    #[tokio::test]
    async fn repository_recorder_stamps_clock_time() {
        let repo = InMemoryRepository::new();
        let workout = Workout::new(
            WorkoutId::new("W1"),
            "Core",
            vec![ExerciseId::new("plank")],
            fixed_now(),
        )
        .unwrap();
        repo.upsert_workout(&workout).await.unwrap();

        let recorder = RepositoryRecorder::new(fixed_clock(), Arc::new(repo.clone()));
        let summary = WorkoutSessionSummary::new(WorkoutId::new("W1"), 30, 1, 1).unwrap();
        let recorded = recorder.record(&summary).await.unwrap();

        assert_eq!(recorded.recorded_at, fixed_now());
        let row = storage::repository::WorkoutSessionRepository::get_session(&repo, recorded.id)
            .await
            .unwrap();
        assert_eq!(row.summary, summary);
    }
}
