mod ids;
mod route;
mod session;
mod summary;
mod timer;
mod workout;

pub use ids::{ExerciseId, ParseIdError, WorkoutId};
pub use route::{NavigationIntent, Route, RouteError};
pub use session::{PersistenceRecord, SessionState, SlotKey};
pub use summary::{SummaryError, WorkoutSessionSummary};
pub use timer::{TimerRecord, TimerState};
pub use workout::{Workout, WorkoutError};
