#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod recorder;
pub mod sessions;

pub use fit_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, HistoryError, NavigationError, RecordError, SessionError, TimerError};
pub use recorder::{HttpSessionRecorder, RecordedSession, RepositoryRecorder, SessionRecorder};

pub use sessions::{
    CompletionFinalizer, FinishOutcome, FinishTrigger, GuardOutcome, GuardState, HistoryService,
    NavigationGuard, Navigator, SessionDeps, SessionHistoryItem, SessionStore, SessionView, Timer,
    TimerToggle, UnloadDecision, WorkoutSession,
};
