//! Event monitors: observability sinks for attempt-boundary events.
//!
//! The retry driver emits three kinds of events while it runs:
//!
//! - `retrying`: an attempt failed and another will run after a backoff;
//!   emitted *before* the backoff sleep, and suppressed for errors
//!   classified as silently recoverable.
//! - `interrupted`: the backoff sleep was cut short by a cancellation
//!   signal; no further attempts run.
//! - `aborted`: the error escapes the driver, either because it was
//!   classified fatal or because the termination policy said stop.
//!
//! Within one retry invocation events arrive in real-time order
//! (`retrying`/`interrupted` zero or more times, then at most one
//! `aborted`), and nothing is delivered after the driver's result
//! materializes. Monitors shared across policies or invocations must be
//! safe under concurrent calls; the driver does not serialize across
//! invocations.
//!
//! A monitor that panics never changes the driver's result: the driver
//! shields every monitor call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

mod log;
mod print;

pub use self::log::{LogAction, LogEvents};
pub use self::print::{PrintAction, PrintEvents, PrintEventsToWriter};

/// A sink for the retry driver's attempt-boundary events.
///
/// Implementations decide per event whether and how to render it; the
/// driver calls them synchronously on its own thread (or task) and ignores
/// anything they do, including panicking.
pub trait EventMonitor<E>: Send + Sync {
    /// An attempt failed and the driver will retry after `backoff`.
    ///
    /// `attempt` is the 1-based index of the attempt that just failed.
    /// `will_retry` is always `true` when the driver emits this event (a
    /// suppressed retry emits `aborted` instead); it is part of the
    /// signature for monitors that render it.
    fn retrying(
        &self,
        name: Option<&str>,
        error: &E,
        attempt: u32,
        backoff: Duration,
        will_retry: bool,
    );

    /// The backoff sleep after `attempt` was interrupted; retrying stops.
    fn interrupted(&self, name: Option<&str>, error: &E, attempt: u32);

    /// The error from `attempt` escapes the driver; retrying stops.
    fn aborted(&self, name: Option<&str>, error: &E, attempt: u32);
}

/// The default monitor: ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl<E> EventMonitor<E> for NoopMonitor {
    fn retrying(&self, _: Option<&str>, _: &E, _: u32, _: Duration, _: bool) {}

    fn interrupted(&self, _: Option<&str>, _: &E, _: u32) {}

    fn aborted(&self, _: Option<&str>, _: &E, _: u32) {}
}

/// Forwards every event to each child monitor, in order.
///
/// # Examples
///
/// ```rust
/// use atmos::{ChainedMonitor, EventMonitor, LogEvents, NoopMonitor};
/// use std::sync::Arc;
///
/// let monitor: ChainedMonitor<std::io::Error> = ChainedMonitor::new(vec![
///     Arc::new(NoopMonitor) as Arc<dyn EventMonitor<_>>,
///     Arc::new(LogEvents::new()),
/// ]);
/// # let _ = monitor;
/// ```
pub struct ChainedMonitor<E> {
    monitors: Vec<Arc<dyn EventMonitor<E>>>,
}

impl<E> ChainedMonitor<E> {
    /// Chain the given monitors; events are forwarded in vector order.
    pub fn new(monitors: Vec<Arc<dyn EventMonitor<E>>>) -> Self {
        Self { monitors }
    }
}

impl<E> EventMonitor<E> for ChainedMonitor<E> {
    fn retrying(
        &self,
        name: Option<&str>,
        error: &E,
        attempt: u32,
        backoff: Duration,
        will_retry: bool,
    ) {
        for monitor in &self.monitors {
            monitor.retrying(name, error, attempt, backoff, will_retry);
        }
    }

    fn interrupted(&self, name: Option<&str>, error: &E, attempt: u32) {
        for monitor in &self.monitors {
            monitor.interrupted(name, error, attempt);
        }
    }

    fn aborted(&self, name: Option<&str>, error: &E, attempt: u32) {
        for monitor in &self.monitors {
            monitor.aborted(name, error, attempt);
        }
    }
}

impl<E> Clone for ChainedMonitor<E> {
    fn clone(&self) -> Self {
        Self {
            monitors: self.monitors.clone(),
        }
    }
}

impl<E> fmt::Debug for ChainedMonitor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedMonitor")
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

/// The operation name shown when the caller did not provide one.
pub(crate) const UNNAMED: &str = "operation";
