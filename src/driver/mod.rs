//! Drivers that execute operations under a retry policy.
//!
//! A driver owns the per-invocation state (an attempt counter and a
//! start-time marker) and walks the same state machine in both execution
//! modes:
//!
//! ```text
//! Attempting -> Succeeded
//!            -> Classifying -> Aborting            (fatal)
//!                           -> WaitingTermination -> Aborting   (stop)
//!                                                 -> Backing -> Sleeping
//! Sleeping   -> Interrupted | Attempting
//! ```
//!
//! Terminals are `Succeeded`, `Aborting`, and `Interrupted`. Per failed
//! attempt the driver consults, in order: the classifier, the termination
//! policy (with the *next* attempt index and the elapsed time), the
//! backoff policy, and the monitor. Then it sleeps.
//!
//! The synchronous driver blocks the calling thread between attempts; the
//! asynchronous driver suspends at exactly two points (awaiting the
//! operation and awaiting the backoff delay) and never blocks an executor
//! thread.
//!
//! Both entry points here take the clock and sleeper explicitly; the
//! [`RetryPolicy`](crate::RetryPolicy) methods pass production defaults.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use crate::classify::ErrorClassification;
use crate::policy::RetryPolicy;

mod blocking;
mod clock;
#[cfg(feature = "async")]
mod future;

pub use blocking::run_blocking;
#[cfg(feature = "async")]
pub use clock::{AsyncSleeper, BoxFuture, NotifiedSleeper, TokioSleeper};
pub use clock::{
    Clock, InterruptHandle, InterruptibleSleeper, MonotonicClock, Sleeper, ThreadSleeper,
};
#[cfg(feature = "async")]
pub use future::run_future;

/// What to do about one failed attempt.
pub(crate) enum Assessment {
    /// Let the error escape.
    Abort,
    /// Sleep for `backoff`, then attempt again. `silent` suppresses the
    /// `retrying` event.
    Retry { backoff: Duration, silent: bool },
}

/// Steps 2b–2e of the loop: classify, consult termination, compute
/// backoff. Shared by both drivers.
pub(crate) fn assess<E>(
    policy: &RetryPolicy<E>,
    attempt: u32,
    elapsed: Duration,
    error: &E,
) -> Assessment {
    let classification = policy.classifier().classify(error);
    if classification.is_fatal() {
        return Assessment::Abort;
    }
    if policy.termination().should_stop(attempt.saturating_add(1), elapsed) {
        return Assessment::Abort;
    }
    Assessment::Retry {
        backoff: policy.backoff().next_backoff(attempt, error),
        silent: classification == ErrorClassification::SilentlyRecoverable,
    }
}

/// Run a monitor call so that nothing it does, including panicking,
/// reaches the driver. The driver's contract is unaffected by a
/// misbehaving monitor.
pub(crate) fn shielded(notify: impl FnOnce()) {
    let _ = catch_unwind(AssertUnwindSafe(notify));
}
