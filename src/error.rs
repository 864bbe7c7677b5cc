//! Error types for retried operations.

use std::fmt;
use std::time::Duration;

/// Error returned when a retried operation's error escapes the driver.
///
/// The driver never invents error values: the carried error is always the
/// last one the operation produced. The variant records *why* it escaped.
///
/// # Examples
///
/// ```rust
/// use atmos::{RetryError, RetryPolicy, TerminationPolicy};
///
/// let policy: RetryPolicy<String> = RetryPolicy::never_retry();
/// let result = policy.retry::<u32, _>(Some("job"), || Err("boom".to_string()));
///
/// match result {
///     Err(RetryError::Aborted { error, attempts, .. }) => {
///         assert_eq!(error, "boom");
///         assert_eq!(attempts, 1);
///     }
///     other => panic!("expected abort, got {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The error was classified fatal, or the termination policy said
    /// stop.
    Aborted {
        /// The error from the final attempt.
        error: E,
        /// Total number of attempts made.
        attempts: u32,
        /// Wall-clock time from the first attempt to the abort.
        total_duration: Duration,
    },
    /// The backoff sleep was cut short by a cancellation signal; the
    /// operation was not retried afterwards.
    Interrupted {
        /// The error from the attempt preceding the interrupted sleep.
        error: E,
        /// Total number of attempts made.
        attempts: u32,
        /// Wall-clock time from the first attempt to the interruption.
        total_duration: Duration,
    },
}

impl<E> RetryError<E> {
    /// Extract the operation's error, discarding retry metadata.
    pub fn into_error(self) -> E {
        match self {
            RetryError::Aborted { error, .. } | RetryError::Interrupted { error, .. } => error,
        }
    }

    /// The operation's error.
    pub fn error(&self) -> &E {
        match self {
            RetryError::Aborted { error, .. } | RetryError::Interrupted { error, .. } => error,
        }
    }

    /// Total number of attempts made before the error escaped.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Aborted { attempts, .. } | RetryError::Interrupted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Wall-clock time spent inside the driver.
    pub fn total_duration(&self) -> Duration {
        match self {
            RetryError::Aborted { total_duration, .. }
            | RetryError::Interrupted { total_duration, .. } => *total_duration,
        }
    }

    /// True if retrying ended because a backoff sleep was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RetryError::Interrupted { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Aborted {
                error,
                attempts,
                total_duration,
            } => write!(
                f,
                "retrying aborted after {} attempts ({:?}): {}",
                attempts, total_duration, error
            ),
            RetryError::Interrupted {
                error,
                attempts,
                total_duration,
            } => write!(
                f,
                "retrying interrupted after {} attempts ({:?}): {}",
                attempts, total_duration, error
            ),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error())
    }
}

/// Returned by a sleeper whose wait was cut short by a cancellation
/// signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepInterrupted;

impl fmt::Display for SleepInterrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("backoff sleep interrupted")
    }
}

impl std::error::Error for SleepInterrupted {}
