mod finalizer;
mod guard;
mod history;
mod store;
mod timer;
mod workflow;

// Public API of the workout session subsystem.
pub use crate::error::SessionError;
pub use finalizer::{CompletionFinalizer, FinishOutcome, FinishTrigger};
pub use guard::{GuardOutcome, GuardState, NavigationGuard, Navigator, UnloadDecision};
pub use history::{HistoryService, SessionHistoryItem, format_duration};
pub use store::SessionStore;
pub use timer::Timer;
pub use workflow::{SessionDeps, SessionView, TimerToggle, WorkoutSession};
