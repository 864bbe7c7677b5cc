//! Testing utilities: recording monitors and manual time.
//!
//! Retry behavior is all about *when* things happen, which makes it slow
//! and flaky to test against real clocks. This module provides the pieces
//! needed to run any timing scenario deterministically and instantly:
//!
//! - [`RecordingMonitor`] captures every event the driver emits;
//! - [`ManualClock`] is a [`Clock`] that only moves when told to;
//! - [`ManualSleeper`] advances a `ManualClock` instead of blocking, so
//!   elapsed-time termination behaves exactly as if the sleeps had
//!   really happened.
//!
//! # Examples
//!
//! ```rust
//! use atmos::driver::run_blocking;
//! use atmos::testing::{ManualClock, ManualSleeper, RecordingMonitor};
//! use atmos::RetryPolicy;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualClock::new());
//! let sleeper = ManualSleeper::new(clock.clone());
//! let monitor = Arc::new(RecordingMonitor::new());
//!
//! let policy: RetryPolicy<String> =
//!     RetryPolicy::new().with_shared_monitor(monitor.clone());
//!
//! let result: Result<u32, _> = run_blocking(&policy, &*clock, &sleeper, Some("job"), || {
//!     Err("always".to_string())
//! });
//!
//! assert!(result.is_err());
//! assert_eq!(monitor.aborted_count(), 1);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::driver::{Clock, Sleeper};
use crate::error::SleepInterrupted;
use crate::monitor::EventMonitor;

/// The kind of a recorded event, with the event-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedEventKind {
    /// A `retrying` event.
    Retrying {
        /// The backoff the driver reported.
        backoff: Duration,
        /// The `will_retry` flag the driver reported.
        will_retry: bool,
    },
    /// An `interrupted` event.
    Interrupted,
    /// An `aborted` event.
    Aborted,
}

/// One event captured by a [`RecordingMonitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent<E> {
    /// Which event was emitted.
    pub kind: RecordedEventKind,
    /// The operation name, if the caller provided one.
    pub name: Option<String>,
    /// A clone of the error the driver reported.
    pub error: E,
    /// The 1-based attempt index the driver reported.
    pub attempt: u32,
}

/// An [`EventMonitor`] that records every event it receives, in order.
///
/// Share it with a policy via
/// [`with_shared_monitor`](crate::RetryPolicy::with_shared_monitor) and
/// keep a second handle for assertions.
pub struct RecordingMonitor<E> {
    events: Mutex<Vec<RecordedEvent<E>>>,
}

impl<E> RecordingMonitor<E> {
    /// An empty recorder.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// All recorded events, in emission order.
    pub fn events(&self) -> Vec<RecordedEvent<E>>
    where
        E: Clone,
    {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The kinds of all recorded events, in emission order.
    pub fn kinds(&self) -> Vec<RecordedEventKind> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.kind)
            .collect()
    }

    /// Number of recorded `retrying` events.
    pub fn retrying_count(&self) -> usize {
        self.count(|kind| matches!(kind, RecordedEventKind::Retrying { .. }))
    }

    /// Number of recorded `interrupted` events.
    pub fn interrupted_count(&self) -> usize {
        self.count(|kind| matches!(kind, RecordedEventKind::Interrupted))
    }

    /// Number of recorded `aborted` events.
    pub fn aborted_count(&self) -> usize {
        self.count(|kind| matches!(kind, RecordedEventKind::Aborted))
    }

    fn count(&self, pred: impl Fn(&RecordedEventKind) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| pred(&event.kind))
            .count()
    }

    fn record(&self, event: RecordedEvent<E>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl<E> Default for RecordingMonitor<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for RecordingMonitor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("RecordingMonitor")
            .field("events", &len)
            .finish()
    }
}

impl<E: Clone + Send> EventMonitor<E> for RecordingMonitor<E> {
    fn retrying(
        &self,
        name: Option<&str>,
        error: &E,
        attempt: u32,
        backoff: Duration,
        will_retry: bool,
    ) {
        self.record(RecordedEvent {
            kind: RecordedEventKind::Retrying { backoff, will_retry },
            name: name.map(str::to_owned),
            error: error.clone(),
            attempt,
        });
    }

    fn interrupted(&self, name: Option<&str>, error: &E, attempt: u32) {
        self.record(RecordedEvent {
            kind: RecordedEventKind::Interrupted,
            name: name.map(str::to_owned),
            error: error.clone(),
            attempt,
        });
    }

    fn aborted(&self, name: Option<&str>, error: &E, attempt: u32) {
        self.record(RecordedEvent {
            kind: RecordedEventKind::Aborted,
            name: name.map(str::to_owned),
            error: error.clone(),
            attempt,
        });
    }
}

/// A [`Clock`] that moves only when advanced.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    /// A clock frozen at the moment of construction.
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`Sleeper`] that advances a [`ManualClock`] instead of blocking.
///
/// Every requested duration is recorded. The sleeper can be told to
/// report interruption on the nth sleep, which exercises the driver's
/// interrupted path without threads or signals.
#[derive(Debug)]
pub struct ManualSleeper {
    clock: Arc<ManualClock>,
    slept: Mutex<Vec<Duration>>,
    interrupt_on: Option<usize>,
}

impl ManualSleeper {
    /// A sleeper that advances `clock` by each requested duration.
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            slept: Mutex::new(Vec::new()),
            interrupt_on: None,
        }
    }

    /// Report interruption on the `nth` sleep (1-based) instead of
    /// advancing the clock.
    pub fn interrupt_on(mut self, nth: usize) -> Self {
        self.interrupt_on = Some(nth);
        self
    }

    /// Every duration requested so far, in order.
    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of all completed and interrupted sleep requests.
    pub fn total_requested(&self) -> Duration {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .sum()
    }
}

impl Sleeper for ManualSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted> {
        let nth = {
            let mut slept = self.slept.lock().unwrap_or_else(PoisonError::into_inner);
            slept.push(duration);
            slept.len()
        };
        if self.interrupt_on == Some(nth) {
            return Err(SleepInterrupted);
        }
        self.clock.advance(duration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_on_demand() {
        let clock = ManualClock::new();
        let before = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now().duration_since(before), Duration::from_secs(5));
    }

    #[test]
    fn manual_sleeper_advances_the_clock_and_records() {
        let clock = Arc::new(ManualClock::new());
        let sleeper = ManualSleeper::new(clock.clone());
        let before = clock.now();

        sleeper.sleep(Duration::from_millis(250)).unwrap();
        sleeper.sleep(Duration::from_millis(750)).unwrap();

        assert_eq!(clock.now().duration_since(before), Duration::from_secs(1));
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_millis(250), Duration::from_millis(750)]
        );
        assert_eq!(sleeper.total_requested(), Duration::from_secs(1));
    }

    #[test]
    fn manual_sleeper_interrupts_the_requested_sleep() {
        let clock = Arc::new(ManualClock::new());
        let sleeper = ManualSleeper::new(clock.clone()).interrupt_on(2);
        let before = clock.now();

        assert!(sleeper.sleep(Duration::from_millis(10)).is_ok());
        assert!(sleeper.sleep(Duration::from_millis(10)).is_err());

        // The interrupted sleep does not advance the clock.
        assert_eq!(
            clock.now().duration_since(before),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn recording_monitor_counts_by_kind() {
        let monitor = RecordingMonitor::<String>::new();
        let err = "e".to_string();

        monitor.retrying(Some("op"), &err, 1, Duration::from_millis(1), true);
        monitor.retrying(Some("op"), &err, 2, Duration::from_millis(2), true);
        monitor.aborted(Some("op"), &err, 3);

        assert_eq!(monitor.retrying_count(), 2);
        assert_eq!(monitor.interrupted_count(), 0);
        assert_eq!(monitor.aborted_count(), 1);

        let events = monitor.events();
        assert_eq!(events[0].attempt, 1);
        assert_eq!(events[1].attempt, 2);
        assert_eq!(events[2].kind, RecordedEventKind::Aborted);
        assert_eq!(events[2].name.as_deref(), Some("op"));
    }
}
