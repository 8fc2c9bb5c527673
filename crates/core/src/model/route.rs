use std::fmt;
use thiserror::Error;
use url::Url;

use crate::model::ids::{ExerciseId, WorkoutId};

const APP_BASE: &str = "app://fit.local/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("invalid navigation target {target:?}: {reason}")]
    Invalid { target: String, reason: String },
}

/// In-app view a navigation target points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    WorkoutDetail {
        workout_id: WorkoutId,
    },
    ExerciseDetail {
        exercise_id: ExerciseId,
        workout_id: Option<WorkoutId>,
    },
    /// Any other in-app path, or an external URL.
    Other(String),
}

impl Route {
    /// Parse a navigation target such as `/exercises/E1?workoutId=W1`.
    ///
    /// Relative targets are resolved against the app root. Absolute URLs that
    /// leave the app are returned as `Route::Other`.
    ///
    /// # Errors
    ///
    /// Returns `RouteError::Invalid` if the target cannot be parsed as a URL.
    pub fn parse(target: &str) -> Result<Self, RouteError> {
        let invalid = |reason: String| RouteError::Invalid {
            target: target.to_owned(),
            reason,
        };
        let base = Url::parse(APP_BASE).map_err(|e| invalid(e.to_string()))?;
        let url = base.join(target).map_err(|e| invalid(e.to_string()))?;

        if url.scheme() != base.scheme() || url.host_str() != base.host_str() {
            return Ok(Self::Other(target.to_owned()));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let route = match segments.as_slice() {
            [] => Self::Home,
            ["workouts", id] => Self::WorkoutDetail {
                workout_id: WorkoutId::new(*id),
            },
            ["exercises", id] => {
                let workout_id = url
                    .query_pairs()
                    .find(|(key, _)| key == "workoutId")
                    .map(|(_, value)| value.into_owned())
                    .filter(|value| !value.is_empty())
                    .map(WorkoutId::new);
                Self::ExerciseDetail {
                    exercise_id: ExerciseId::new(*id),
                    workout_id,
                }
            }
            _ => Self::Other(url.path().to_owned()),
        };
        Ok(route)
    }

    /// Like [`Route::parse`], but unparseable targets become `Route::Other`.
    #[must_use]
    pub fn resolve(target: &str) -> Self {
        Self::parse(target).unwrap_or_else(|_| Self::Other(target.to_owned()))
    }

    /// True for the workout's own detail view and its exercise-detail views.
    #[must_use]
    pub fn belongs_to(&self, workout: &WorkoutId) -> bool {
        match self {
            Self::WorkoutDetail { workout_id } => workout_id == workout,
            Self::ExerciseDetail {
                workout_id: Some(workout_id),
                ..
            } => workout_id == workout,
            _ => false,
        }
    }
}

/// A navigation the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationIntent {
    Push(String),
    Replace(String),
    Back,
    Forward,
}

impl NavigationIntent {
    #[must_use]
    pub fn push(target: impl Into<String>) -> Self {
        Self::Push(target.into())
    }

    /// Destination, when known. History moves have none.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Push(target) | Self::Replace(target) => Some(target),
            Self::Back | Self::Forward => None,
        }
    }

    #[must_use]
    pub fn route(&self) -> Option<Route> {
        self.target().map(Route::resolve)
    }
}

impl fmt::Display for NavigationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push(target) => write!(f, "push {target}"),
            Self::Replace(target) => write!(f, "replace {target}"),
            Self::Back => f.write_str("back"),
            Self::Forward => f.write_str("forward"),
        }
    }
}
