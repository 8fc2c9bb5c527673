use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fit_core::model::{SlotKey, TimerRecord, TimerState, WorkoutId};
use storage::slot::DurableSlot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::TimerError;

const TICK: Duration = Duration::from_secs(1);

/// Advisory copy of the timer kept in a durable slot.
///
/// Slot I/O happens outside the watch lock. `writes` orders a ticker's write
/// against the delete in [`Timer::stop`].
#[derive(Clone)]
struct TimerMirror {
    slot: Arc<dyn DurableSlot>,
    key: SlotKey,
    writes: Arc<Mutex<()>>,
}

impl TimerMirror {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `state` unless the timer was stopped since `epoch` was read.
    fn write_if_current(&self, state: TimerState, epochs: &AtomicU64, epoch: u64) {
        let _guard = self.lock();
        if epochs.load(Ordering::SeqCst) != epoch {
            return;
        }
        let result = state
            .to_record()
            .encode()
            .map_err(|e| e.to_string())
            .and_then(|raw| self.slot.set(&self.key, &raw).map_err(|e| e.to_string()));
        if let Err(error) = result {
            tracing::debug!(key = %self.key, %error, "timer mirror write failed");
        }
    }

    fn clear(&self) {
        let _guard = self.lock();
        if let Err(error) = self.slot.delete(&self.key) {
            tracing::debug!(key = %self.key, %error, "timer mirror delete failed");
        }
    }
}

/// Elapsed-seconds counter driven by a one-second ticker task.
///
/// At most one ticker is outstanding per timer. The running flag, the epoch
/// and the counter are only changed under the watch channel's lock, so once
/// [`Timer::stop`] returns no earlier ticker can increment again.
pub struct Timer {
    state: Arc<watch::Sender<TimerState>>,
    epoch: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
    mirror: Option<TimerMirror>,
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TimerState::default());
        Self {
            state: Arc::new(tx),
            epoch: Arc::new(AtomicU64::new(0)),
            ticker: None,
            mirror: None,
        }
    }

    /// Mirror `{elapsedSeconds, isRunning}` to the slot keyed by `workout_id`.
    #[must_use]
    pub fn with_mirror(mut self, slot: Arc<dyn DurableSlot>, workout_id: Option<&WorkoutId>) -> Self {
        self.mirror = Some(TimerMirror {
            slot,
            key: SlotKey::timer(workout_id),
            writes: Arc::new(Mutex::new(())),
        });
        self
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.state().elapsed_seconds
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running
    }

    /// Receiver that observes every tick, start and stop.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.subscribe()
    }

    /// Load the mirrored clock so a reload keeps displaying the elapsed time.
    ///
    /// Only the displayed value is restored; the timer stays stopped. Returns the
    /// mirrored record, or `None` if absent or unreadable.
    pub fn restore(&mut self) -> Option<TimerRecord> {
        let mirror = self.mirror.as_ref()?;
        let record = match mirror.slot.get(&mirror.key) {
            Ok(Some(raw)) => match TimerRecord::decode(&raw) {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!(key = %mirror.key, %error, "discarding malformed timer mirror");
                    return None;
                }
            },
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(key = %mirror.key, %error, "timer mirror unreadable");
                return None;
            }
        };

        self.state.send_if_modified(|s| {
            if s.is_running {
                return false;
            }
            s.elapsed_seconds = record.elapsed_seconds;
            true
        });
        Some(record)
    }

    /// Start counting. Returns `Ok(false)` if already running.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::NoRuntime` when called outside a tokio runtime.
    pub fn start(&mut self) -> Result<bool, TimerError> {
        if self.is_running() {
            return Ok(false);
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| TimerError::NoRuntime)?;

        let epoch = self.epoch.load(Ordering::SeqCst);
        let mirror = self.mirror.clone();
        self.state.send_modify(|s| s.is_running = true);
        if let Some(mirror) = &mirror {
            mirror.write_if_current(self.state(), &self.epoch, epoch);
        }

        let state = Arc::clone(&self.state);
        let epochs = Arc::clone(&self.epoch);
        self.ticker = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;
                let mut ticked = None;
                state.send_if_modified(|s| {
                    if !s.is_running || epochs.load(Ordering::SeqCst) != epoch {
                        return false;
                    }
                    s.elapsed_seconds = s.elapsed_seconds.saturating_add(1);
                    ticked = Some(*s);
                    true
                });
                let Some(snapshot) = ticked else {
                    break;
                };
                if let Some(mirror) = &mirror {
                    mirror.write_if_current(snapshot, &epochs, epoch);
                }
            }
        }));

        tracing::debug!("timer started");
        Ok(true)
    }

    /// Stop counting and return the final elapsed seconds, resetting to zero.
    ///
    /// Returns 0 and changes nothing when the timer is not running.
    pub fn stop(&mut self) -> u64 {
        let mut elapsed = 0;
        let stopped = self.state.send_if_modified(|s| {
            if !s.is_running {
                return false;
            }
            self.epoch.fetch_add(1, Ordering::SeqCst);
            elapsed = s.elapsed_seconds;
            *s = TimerState::default();
            true
        });
        if !stopped {
            return 0;
        }

        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(mirror) = &self.mirror {
            mirror.clear();
        }
        tracing::debug!(elapsed_seconds = elapsed, "timer stopped");
        elapsed
    }

    /// Zero a stopped timer and drop its mirror. No effect while running.
    pub fn reset(&mut self) {
        let reset = self.state.send_if_modified(|s| {
            if s.is_running || s.elapsed_seconds == 0 {
                return false;
            }
            s.elapsed_seconds = 0;
            true
        });
        if !self.is_running() {
            if let Some(mirror) = &self.mirror {
                mirror.clear();
            }
        }
        if reset {
            tracing::debug!("timer reset");
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("state", &self.state())
            .field("ticker", &self.ticker.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::slot::InMemorySlot;

    async fn wait(millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn counts_simulated_seconds_and_resets_on_stop() {
        let mut timer = Timer::new();
        assert!(timer.start().unwrap());
        wait(3_500).await;

        assert_eq!(timer.stop(), 3);
        assert_eq!(timer.state(), TimerState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_start_returns_zero() {
        let mut timer = Timer::new();
        assert_eq!(timer.stop(), 0);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_add_a_ticker() {
        let mut timer = Timer::new();
        assert!(timer.start().unwrap());
        assert!(!timer.start().unwrap());
        wait(2_500).await;
        assert_eq!(timer.elapsed_seconds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_lands_after_stop() {
        let mut timer = Timer::new();
        timer.start().unwrap();
        wait(1_500).await;
        assert_eq!(timer.stop(), 1);
        assert_eq!(timer.stop(), 0);

        wait(5_000).await;
        assert_eq!(timer.elapsed_seconds(), 0);

        timer.start().unwrap();
        wait(2_500).await;
        assert_eq!(timer.stop(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_observe_ticks() {
        let mut timer = Timer::new();
        let mut rx = timer.subscribe();
        timer.start().unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_running);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().elapsed_seconds, 1);
        timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn mirror_tracks_running_clock_and_is_cleared_on_stop() {
        let slot = InMemorySlot::new();
        let workout = WorkoutId::new("W1");
        let key = SlotKey::timer(Some(&workout));
        let mut timer = Timer::new().with_mirror(Arc::new(slot.clone()), Some(&workout));

        timer.start().unwrap();
        wait(2_500).await;
        let raw = slot.get(&key).unwrap().unwrap();
        assert_eq!(
            TimerRecord::decode(&raw).unwrap(),
            TimerRecord {
                elapsed_seconds: 2,
                is_running: true
            }
        );

        timer.stop();
        assert!(slot.get(&key).unwrap().is_none());
    }

    /// Slot that reads the timer's watch channel from inside `set`.
    #[derive(Default)]
    struct ObservingSlot {
        inner: InMemorySlot,
        timer: Mutex<Option<watch::Receiver<TimerState>>>,
        seen: Mutex<Vec<TimerState>>,
    }

    impl DurableSlot for ObservingSlot {
        fn get(&self, key: &SlotKey) -> Result<Option<String>, storage::repository::StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &SlotKey, value: &str) -> Result<(), storage::repository::StorageError> {
            if let Some(rx) = self.timer.lock().unwrap().as_ref() {
                self.seen.lock().unwrap().push(*rx.borrow());
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &SlotKey) -> Result<(), storage::repository::StorageError> {
            self.inner.delete(key)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mirror_writes_do_not_hold_the_state_lock() {
        let slot = Arc::new(ObservingSlot::default());
        let workout = WorkoutId::new("W1");
        let mut timer = Timer::new().with_mirror(slot.clone(), Some(&workout));
        *slot.timer.lock().unwrap() = Some(timer.subscribe());

        timer.start().unwrap();
        wait(2_500).await;
        assert_eq!(timer.stop(), 2);

        let seen: Vec<u64> = slot
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.elapsed_seconds)
            .collect();
        assert_eq!(seen, [0, 1, 2]);
        assert!(slot.inner.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restore_shows_mirrored_clock_and_resumes_from_it() {
        let slot = InMemorySlot::new();
        let workout = WorkoutId::new("W1");
        slot.set(
            &SlotKey::timer(Some(&workout)),
            r#"{"elapsedSeconds":40,"isRunning":true}"#,
        )
        .unwrap();

        let mut timer = Timer::new().with_mirror(Arc::new(slot), Some(&workout));
        let record = timer.restore().unwrap();
        assert!(record.is_running);
        assert_eq!(timer.elapsed_seconds(), 40);
        assert!(!timer.is_running());

        timer.start().unwrap();
        wait(1_500).await;
        assert_eq!(timer.stop(), 41);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let mut timer = Timer::new();
        assert!(matches!(timer.start(), Err(TimerError::NoRuntime)));
        assert!(!timer.is_running());
    }
}
