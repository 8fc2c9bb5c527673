use thiserror::Error;

use crate::model::{RouteError, SummaryError, WorkoutError};

/// Any domain validation failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error(transparent)]
    Workout(#[from] WorkoutError),
    #[error(transparent)]
    Route(#[from] RouteError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{WorkoutId, WorkoutSessionSummary};

    #[test]
    fn wraps_summary_errors_transparently() {
        let err: Error = WorkoutSessionSummary::new(WorkoutId::new("W1"), 0, 0, 1)
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Summary(SummaryError::DurationTooShort)));
        assert_eq!(err.to_string(), "duration must be at least one second");
    }
}
