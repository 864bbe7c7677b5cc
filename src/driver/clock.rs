//! Injected time sources and sleep primitives.
//!
//! The drivers never call `Instant::now` or a sleep function directly;
//! they go through the [`Clock`], [`Sleeper`], and (with the `async`
//! feature) [`AsyncSleeper`] seams so tests can run timing scenarios
//! without spending wall-clock time and callers can supply interruptible
//! sleeps.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::SleepInterrupted;

/// A monotonically non-decreasing time source.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The default clock: `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A blocking delay primitive for the synchronous driver.
pub trait Sleeper: Send + Sync {
    /// Block for `duration`, or return `Err(SleepInterrupted)` if the wait
    /// was cut short by a cancellation signal.
    fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted>;
}

/// The default blocking sleeper: `std::thread::sleep`. Uninterruptible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted> {
        std::thread::sleep(duration);
        Ok(())
    }
}

/// A blocking sleeper whose waits can be cut short from another thread.
///
/// The interrupt signal is latched: firing the handle while no sleep is in
/// progress interrupts the next sleep. A sleep that observes the signal
/// consumes it, so the sleeper is reusable afterwards.
///
/// # Examples
///
/// ```rust
/// use atmos::driver::{InterruptibleSleeper, Sleeper};
/// use std::time::Duration;
///
/// let sleeper = InterruptibleSleeper::new();
/// let handle = sleeper.handle();
///
/// let waiter = std::thread::spawn(move || {
///     std::thread::sleep(Duration::from_millis(10));
///     handle.interrupt();
/// });
///
/// assert!(sleeper.sleep(Duration::from_secs(60)).is_err());
/// waiter.join().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct InterruptibleSleeper {
    shared: Arc<(Mutex<bool>, Condvar)>,
}

/// Fires the interrupt signal of an [`InterruptibleSleeper`].
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    shared: Arc<(Mutex<bool>, Condvar)>,
}

impl InterruptibleSleeper {
    /// A sleeper with no pending interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that interrupts this sleeper's waits.
    pub fn handle(&self) -> InterruptHandle {
        InterruptHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl InterruptHandle {
    /// Cut short the current (or next) sleep.
    pub fn interrupt(&self) {
        let (lock, cvar) = &*self.shared;
        let mut interrupted = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *interrupted = true;
        cvar.notify_all();
    }
}

impl Sleeper for InterruptibleSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted> {
        let (lock, cvar) = &*self.shared;
        let deadline = Instant::now() + duration;
        let mut interrupted = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *interrupted {
                *interrupted = false;
                return Err(SleepInterrupted);
            }
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => return Ok(()),
            };
            let (guard, _) = cvar
                .wait_timeout(interrupted, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            interrupted = guard;
        }
    }
}

/// A boxed `Send` future.
#[cfg(feature = "async")]
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A non-blocking delay primitive for the asynchronous driver.
#[cfg(feature = "async")]
pub trait AsyncSleeper: Send + Sync {
    /// Resolve after `duration`, or with `Err(SleepInterrupted)` if the
    /// wait was cut short cooperatively.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, Result<(), SleepInterrupted>>;
}

/// The default async sleeper: `tokio::time::sleep`. Uninterruptible (but
/// cancelled along with the retry future when that is dropped).
#[cfg(feature = "async")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[cfg(feature = "async")]
impl AsyncSleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, Result<(), SleepInterrupted>> {
        Box::pin(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }
}

/// An async sleeper whose waits resolve early when interrupted.
///
/// Interruption is one permit deep: a call to
/// [`interrupt`](NotifiedSleeper::interrupt) with no wait in progress
/// interrupts the next wait.
#[cfg(feature = "async")]
#[derive(Debug, Clone, Default)]
pub struct NotifiedSleeper {
    notify: Arc<tokio::sync::Notify>,
}

#[cfg(feature = "async")]
impl NotifiedSleeper {
    /// A sleeper with no pending interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cut short the current (or next) wait.
    pub fn interrupt(&self) {
        self.notify.notify_one();
    }
}

#[cfg(feature = "async")]
impl AsyncSleeper for NotifiedSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, Result<(), SleepInterrupted>> {
        let notify = Arc::clone(&self.notify);
        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = notify.notified() => Err(SleepInterrupted),
            }
        })
    }
}
