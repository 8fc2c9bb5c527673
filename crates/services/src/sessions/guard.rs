use std::fmt;
use std::sync::Arc;

use fit_core::model::{NavigationIntent, WorkoutId};

use crate::error::NavigationError;

/// Routing capability the guard wraps. The guard never routes by itself.
pub trait Navigator: Send + Sync {
    /// Perform the navigation.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError` if the router rejects or fails the navigation.
    fn dispatch(&self, intent: &NavigationIntent) -> Result<(), NavigationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// No active session; every navigation passes.
    Idle,
    /// Active session; navigation outside the workout is intercepted.
    Armed { workout_id: Option<WorkoutId> },
    /// An intercepted navigation waits for the user's answer.
    PendingConfirmation {
        workout_id: Option<WorkoutId>,
        intent: NavigationIntent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Navigated,
    Intercepted,
}

/// Answer to the platform's before-unload hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    Allow,
    /// Ask the platform to show its generic "leave this page?" prompt.
    Prompt,
}

/// Intercepts navigation away from an active workout session.
///
/// Navigation to the workout's own detail view, or to an exercise detail view
/// carrying the same workout id, always passes. History moves (back/forward)
/// have no known target and are intercepted while armed.
pub struct NavigationGuard {
    navigator: Arc<dyn Navigator>,
    state: GuardState,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            state: GuardState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        !matches!(self.state, GuardState::Idle)
    }

    #[must_use]
    pub fn is_confirmation_pending(&self) -> bool {
        matches!(self.state, GuardState::PendingConfirmation { .. })
    }

    /// The navigation waiting for confirmation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&NavigationIntent> {
        match &self.state {
            GuardState::PendingConfirmation { intent, .. } => Some(intent),
            _ => None,
        }
    }

    /// Idle → Armed. No effect when already armed or pending.
    pub fn arm(&mut self, workout_id: Option<WorkoutId>) {
        if matches!(self.state, GuardState::Idle) {
            tracing::debug!(workout_id = ?workout_id, "navigation guard armed");
            self.state = GuardState::Armed { workout_id };
        }
    }

    /// Any state → Idle, dropping a pending navigation.
    pub fn disarm(&mut self) {
        if !matches!(self.state, GuardState::Idle) {
            tracing::debug!("navigation guard disarmed");
        }
        self.state = GuardState::Idle;
    }

    /// Navigate, unless the guard is armed and the target leaves the workout.
    ///
    /// An intercepted attempt replaces any navigation already pending.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError` if a pass-through navigation fails.
    pub fn attempt_navigate(
        &mut self,
        intent: NavigationIntent,
    ) -> Result<GuardOutcome, NavigationError> {
        let workout_id = match &self.state {
            GuardState::Idle => {
                self.navigator.dispatch(&intent)?;
                return Ok(GuardOutcome::Navigated);
            }
            GuardState::Armed { workout_id }
            | GuardState::PendingConfirmation { workout_id, .. } => workout_id.clone(),
        };

        if Self::is_allowed(workout_id.as_ref(), &intent) {
            self.navigator.dispatch(&intent)?;
            return Ok(GuardOutcome::Navigated);
        }

        tracing::info!(%intent, "navigation intercepted: workout session active");
        self.state = GuardState::PendingConfirmation { workout_id, intent };
        Ok(GuardOutcome::Intercepted)
    }

    /// PendingConfirmation → Idle, handing back the navigation to run once the
    /// session has been finished.
    pub fn take_pending(&mut self) -> Option<NavigationIntent> {
        if !self.is_confirmation_pending() {
            return None;
        }
        match std::mem::replace(&mut self.state, GuardState::Idle) {
            GuardState::PendingConfirmation { intent, .. } => Some(intent),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// PendingConfirmation → Armed, discarding the navigation. Returns whether
    /// anything was pending.
    pub fn cancel(&mut self) -> bool {
        let GuardState::PendingConfirmation { workout_id, intent } = &self.state else {
            return false;
        };
        tracing::debug!(%intent, "intercepted navigation cancelled");
        self.state = GuardState::Armed {
            workout_id: workout_id.clone(),
        };
        true
    }

    /// Run a navigation without interception (used after a confirmed finish).
    ///
    /// # Errors
    ///
    /// Returns `NavigationError` if the navigator fails.
    pub fn dispatch(&self, intent: &NavigationIntent) -> Result<(), NavigationError> {
        self.navigator.dispatch(intent)
    }

    /// Tab close or reload. No finish logic runs here; the durable session
    /// record is what lets the next load recover.
    #[must_use]
    pub fn before_unload(&self) -> UnloadDecision {
        if self.is_armed() {
            UnloadDecision::Prompt
        } else {
            UnloadDecision::Allow
        }
    }

    fn is_allowed(workout_id: Option<&WorkoutId>, intent: &NavigationIntent) -> bool {
        match (workout_id, intent.route()) {
            (Some(workout_id), Some(route)) => route.belongs_to(workout_id),
            _ => false,
        }
    }
}

impl fmt::Debug for NavigationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationGuard")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Navigator that records dispatched intents and can be told to fail.
    #[derive(Default)]
    pub(crate) struct RecordingNavigator {
        pub(crate) dispatched: Mutex<Vec<NavigationIntent>>,
        pub(crate) fail: Mutex<bool>,
    }

    impl RecordingNavigator {
        pub(crate) fn history(&self) -> Vec<NavigationIntent> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn dispatch(&self, intent: &NavigationIntent) -> Result<(), NavigationError> {
            if *self.fail.lock().unwrap() {
                return Err(NavigationError::Failed {
                    intent: intent.to_string(),
                    reason: "router offline".into(),
                });
            }
            self.dispatched.lock().unwrap().push(intent.clone());
            Ok(())
        }
    }

    fn armed_guard(workout: &str) -> (NavigationGuard, Arc<RecordingNavigator>) {
        let nav = Arc::new(RecordingNavigator::default());
        let mut guard = NavigationGuard::new(nav.clone());
        guard.arm(Some(WorkoutId::new(workout)));
        (guard, nav)
    }

    #[test]
    fn idle_guard_passes_everything() {
        let nav = Arc::new(RecordingNavigator::default());
        let mut guard = NavigationGuard::new(nav.clone());

        assert_eq!(
            guard.attempt_navigate(NavigationIntent::Back).unwrap(),
            GuardOutcome::Navigated
        );
        assert_eq!(guard.before_unload(), UnloadDecision::Allow);
        assert_eq!(nav.history(), [NavigationIntent::Back]);
    }

    #[test]
    fn same_workout_exercise_detail_is_not_intercepted() {
        let (mut guard, nav) = armed_guard("W123");
        let outcome = guard
            .attempt_navigate(NavigationIntent::push("/exercises/E1?workoutId=W123"))
            .unwrap();

        assert_eq!(outcome, GuardOutcome::Navigated);
        assert!(!guard.is_confirmation_pending());
        assert_eq!(nav.history().len(), 1);

        guard
            .attempt_navigate(NavigationIntent::Replace("/workouts/W123".into()))
            .unwrap();
        assert_eq!(
            guard.state(),
            &GuardState::Armed {
                workout_id: Some(WorkoutId::new("W123"))
            }
        );
    }

    #[test]
    fn different_workout_is_intercepted() {
        let (mut guard, nav) = armed_guard("W123");
        let outcome = guard
            .attempt_navigate(NavigationIntent::push("/workouts/W999"))
            .unwrap();

        assert_eq!(outcome, GuardOutcome::Intercepted);
        assert!(guard.is_confirmation_pending());
        assert_eq!(
            guard.pending(),
            Some(&NavigationIntent::push("/workouts/W999"))
        );
        assert!(nav.history().is_empty());
    }

    #[test]
    fn unscoped_exercise_and_history_moves_are_intercepted() {
        let (mut guard, _nav) = armed_guard("W123");
        assert_eq!(
            guard
                .attempt_navigate(NavigationIntent::push("/exercises/E1"))
                .unwrap(),
            GuardOutcome::Intercepted
        );
        assert_eq!(
            guard.attempt_navigate(NavigationIntent::Forward).unwrap(),
            GuardOutcome::Intercepted
        );
        assert_eq!(guard.pending(), Some(&NavigationIntent::Forward));
    }

    #[test]
    fn cancel_returns_to_armed_and_discards_intent() {
        let (mut guard, nav) = armed_guard("W1");
        guard.attempt_navigate(NavigationIntent::push("/")).unwrap();

        assert!(guard.cancel());
        assert!(!guard.cancel());
        assert!(guard.is_armed());
        assert_eq!(guard.take_pending(), None);
        assert!(nav.history().is_empty());
    }

    #[test]
    fn take_pending_goes_idle() {
        let (mut guard, _nav) = armed_guard("W1");
        guard.attempt_navigate(NavigationIntent::push("/")).unwrap();

        assert_eq!(guard.take_pending(), Some(NavigationIntent::push("/")));
        assert_eq!(guard.state(), &GuardState::Idle);
        assert_eq!(guard.take_pending(), None);
    }

    #[test]
    fn unload_prompts_while_armed() {
        let (mut guard, _nav) = armed_guard("W1");
        assert_eq!(guard.before_unload(), UnloadDecision::Prompt);
        guard.disarm();
        assert_eq!(guard.before_unload(), UnloadDecision::Allow);
    }

    #[test]
    fn pass_through_failure_is_reported() {
        let (mut guard, nav) = armed_guard("W1");
        *nav.fail.lock().unwrap() = true;
        let err = guard
            .attempt_navigate(NavigationIntent::push("/workouts/W1"))
            .unwrap_err();
        assert!(matches!(err, NavigationError::Failed { .. }));
        assert!(guard.is_armed());
    }
}
