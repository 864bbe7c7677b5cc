//! # Atmos
//!
//! Declarative retry policies for fallible operations.
//!
//! ## Philosophy
//!
//! Atmos follows a **pure core, imperative shell** split:
//!
//! - **Policies are pure data.** A [`RetryPolicy`] bundles four pluggable
//!   axes: [`TerminationPolicy`] (when to stop), [`BackoffPolicy`] (how
//!   long to wait), [`ErrorClassifier`] (fatal / recoverable / silently
//!   recoverable), and an [`EventMonitor`] (observability). It performs
//!   no I/O itself. Policies are immutable, cheap to clone, and easy to
//!   test.
//! - **Drivers execute.** [`RetryPolicy::retry`] blocks the calling thread
//!   between attempts; [`RetryPolicy::retry_async`] suspends on the tokio
//!   timer instead. Both walk the same state machine and emit the same
//!   events; see the [`driver`] module for the injectable clock and sleep
//!   seams.
//!
//! ## Quick Example
//!
//! ```rust
//! use atmos::{BackoffPolicy, RetryPolicy, TerminationPolicy};
//! use std::time::Duration;
//!
//! let policy: RetryPolicy<String> = RetryPolicy::new()
//!     .with_termination(
//!         // Up to 5 attempts, or half a second, whichever first.
//!         TerminationPolicy::limit_attempts(5)
//!             | TerminationPolicy::limit_duration(Duration::from_millis(500)),
//!     )
//!     .with_backoff(BackoffPolicy::exponential(Duration::from_millis(10)));
//!
//! let mut attempts = 0;
//! let value = policy
//!     .retry(Some("connect"), || {
//!         attempts += 1;
//!         if attempts < 3 {
//!             Err("connection refused".to_string())
//!         } else {
//!             Ok(attempts)
//!         }
//!     })
//!     .unwrap();
//!
//! assert_eq!(value, 3);
//! ```
//!
//! ## Classification
//!
//! Every failure is classified before any other decision: `Fatal` errors
//! abort immediately, `Recoverable` errors retry with a `retrying` event,
//! and `SilentlyRecoverable` errors retry without one; the retry still
//! happens, only the noise is suppressed. Unclassified errors are
//! `Recoverable`.
//!
//! ## Monitoring
//!
//! Monitors observe attempt boundaries: [`PrintEvents`] writes to a byte
//! stream, [`PrintEventsToWriter`] to a character writer, [`LogEvents`]
//! logs through `tracing`, and [`ChainedMonitor`] fans out to several.
//! The default is a no-op. The [`testing`] module has a recording monitor
//! plus manual clocks and sleepers for deterministic timing tests.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backoff;
pub mod classify;
pub mod driver;
pub mod error;
pub mod monitor;
pub mod policy;
pub mod termination;
pub mod testing;

// Re-exports
pub use backoff::{BackoffPolicy, JitterRange, MAX_BACKOFF};
pub use classify::{ErrorClassification, ErrorClassifier};
pub use error::{RetryError, SleepInterrupted};
pub use monitor::{
    ChainedMonitor, EventMonitor, LogAction, LogEvents, NoopMonitor, PrintAction, PrintEvents,
    PrintEventsToWriter,
};
pub use policy::RetryPolicy;
pub use termination::TerminationPolicy;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backoff::{BackoffPolicy, JitterRange};
    pub use crate::classify::{ErrorClassification, ErrorClassifier};
    pub use crate::error::RetryError;
    pub use crate::monitor::EventMonitor;
    pub use crate::policy::RetryPolicy;
    pub use crate::termination::TerminationPolicy;
}
