//! Monitor that logs events through `tracing`.

use std::fmt::Display;
use std::time::Duration;

use tracing::Level;

use super::{EventMonitor, UNNAMED};

/// How the logging monitor treats one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    /// Ignore the event.
    Nothing,
    /// Log the event at the given level.
    At(Level),
}

/// Logs events via the `tracing` ecosystem.
///
/// Each event kind carries its own [`LogAction`]; the defaults follow the
/// usual severity ladder: `retrying` at INFO, `interrupted` at WARN,
/// `aborted` at ERROR.
///
/// # Examples
///
/// ```rust
/// use atmos::{LogAction, LogEvents};
/// use tracing::Level;
///
/// // Quiet retries, loud aborts.
/// let monitor = LogEvents::new()
///     .on_retrying(LogAction::Nothing)
///     .on_aborted(LogAction::At(Level::ERROR));
/// # let _ = monitor;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEvents {
    retrying: LogAction,
    interrupted: LogAction,
    aborted: LogAction,
}

impl LogEvents {
    /// Log with the default levels: INFO / WARN / ERROR.
    pub fn new() -> Self {
        Self {
            retrying: LogAction::At(Level::INFO),
            interrupted: LogAction::At(Level::WARN),
            aborted: LogAction::At(Level::ERROR),
        }
    }

    /// Replace the action for `retrying` events.
    pub fn on_retrying(mut self, action: LogAction) -> Self {
        self.retrying = action;
        self
    }

    /// Replace the action for `interrupted` events.
    pub fn on_interrupted(mut self, action: LogAction) -> Self {
        self.interrupted = action;
        self
    }

    /// Replace the action for `aborted` events.
    pub fn on_aborted(mut self, action: LogAction) -> Self {
        self.aborted = action;
        self
    }
}

impl Default for LogEvents {
    fn default() -> Self {
        Self::new()
    }
}

// The tracing macros take a const level, so dynamic dispatch is a cascade.
macro_rules! emit {
    ($level:expr, $($field:tt)*) => {
        if $level == Level::ERROR {
            tracing::error!($($field)*)
        } else if $level == Level::WARN {
            tracing::warn!($($field)*)
        } else if $level == Level::INFO {
            tracing::info!($($field)*)
        } else if $level == Level::DEBUG {
            tracing::debug!($($field)*)
        } else {
            tracing::trace!($($field)*)
        }
    };
}

impl<E: Display> EventMonitor<E> for LogEvents {
    fn retrying(&self, name: Option<&str>, error: &E, attempt: u32, backoff: Duration, _: bool) {
        if let LogAction::At(level) = self.retrying {
            emit!(
                level,
                name = name.unwrap_or(UNNAMED),
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            );
        }
    }

    fn interrupted(&self, name: Option<&str>, error: &E, attempt: u32) {
        if let LogAction::At(level) = self.interrupted {
            emit!(
                level,
                name = name.unwrap_or(UNNAMED),
                attempt,
                error = %error,
                "backoff interrupted, giving up"
            );
        }
    }

    fn aborted(&self, name: Option<&str>, error: &E, attempt: u32) {
        if let LogAction::At(level) = self.aborted {
            emit!(
                level,
                name = name.unwrap_or(UNNAMED),
                attempt,
                error = %error,
                "retrying aborted"
            );
        }
    }
}
