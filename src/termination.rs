//! Termination policies: when to stop retrying.
//!
//! A [`TerminationPolicy`] is pure data - it describes a stop condition but
//! performs no I/O and holds no per-invocation state. The driver consults
//! it after every failed attempt with the index of the attempt that *would*
//! run next and the wall-clock time elapsed since the first attempt began.
//!
//! Policies compose with [`and`](TerminationPolicy::and) /
//! [`or`](TerminationPolicy::or) (also available as the `&` and `|`
//! operators), so "stop after 5 attempts but not before 30 seconds have
//! passed" and "stop after 5 attempts or 30 seconds, whichever first" are
//! both one expression.

use std::ops::{BitAnd, BitOr};
use std::time::Duration;

/// A condition under which the retry driver stops retrying.
///
/// The termination policy is never consulted before the first attempt:
/// every retry policy makes at least one attempt, including
/// [`Immediately`](TerminationPolicy::Immediately) ("never retry").
///
/// # Examples
///
/// ```rust
/// use atmos::TerminationPolicy;
/// use std::time::Duration;
///
/// // Stop after 5 attempts OR once 30 seconds have elapsed.
/// let fast = TerminationPolicy::limit_attempts(5)
///     | TerminationPolicy::limit_duration(Duration::from_secs(30));
///
/// // Stop after 5 attempts, but keep going until 30 seconds have elapsed.
/// let patient = TerminationPolicy::limit_attempts(5)
///     & TerminationPolicy::limit_duration(Duration::from_secs(30));
///
/// assert!(fast.should_stop(6, Duration::from_secs(1)));
/// assert!(!patient.should_stop(6, Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Always stop: the operation is attempted once and never retried.
    Immediately,
    /// Never stop of its own accord; only a fatal classification ends the
    /// retrying.
    Never,
    /// Stop once this many attempts have already run.
    LimitAttempts(u32),
    /// Stop once the cumulative elapsed time since the first attempt began
    /// reaches this duration.
    LimitDuration(Duration),
    /// Stop only when *both* halves signal stop (logical AND).
    Both(Box<TerminationPolicy>, Box<TerminationPolicy>),
    /// Stop when *either* half signals stop (logical OR).
    Either(Box<TerminationPolicy>, Box<TerminationPolicy>),
}

impl TerminationPolicy {
    /// Limit the total number of attempts (including the first).
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero: a policy that makes no attempt at
    /// all is always a bug.
    pub fn limit_attempts(max_attempts: u32) -> Self {
        assert!(max_attempts >= 1, "limit_attempts requires at least one attempt");
        TerminationPolicy::LimitAttempts(max_attempts)
    }

    /// Limit the cumulative wall-clock time spent retrying.
    ///
    /// # Panics
    ///
    /// Panics if `max_elapsed` is zero.
    pub fn limit_duration(max_elapsed: Duration) -> Self {
        assert!(
            max_elapsed > Duration::ZERO,
            "limit_duration requires a positive duration"
        );
        TerminationPolicy::LimitDuration(max_elapsed)
    }

    /// Decide whether the attempt numbered `next_attempt` should be
    /// suppressed, given `elapsed` time since the first attempt began.
    ///
    /// `next_attempt` is the 1-based index of the attempt that *would* run
    /// next, so it is at least 2 whenever the driver consults the policy.
    pub fn should_stop(&self, next_attempt: u32, elapsed: Duration) -> bool {
        match self {
            TerminationPolicy::Immediately => true,
            TerminationPolicy::Never => false,
            TerminationPolicy::LimitAttempts(max) => next_attempt > *max,
            TerminationPolicy::LimitDuration(max) => elapsed >= *max,
            TerminationPolicy::Both(a, b) => {
                a.should_stop(next_attempt, elapsed) && b.should_stop(next_attempt, elapsed)
            }
            TerminationPolicy::Either(a, b) => {
                a.should_stop(next_attempt, elapsed) || b.should_stop(next_attempt, elapsed)
            }
        }
    }

    /// Stop only when both `self` and `other` signal stop.
    pub fn and(self, other: TerminationPolicy) -> Self {
        TerminationPolicy::Both(Box::new(self), Box::new(other))
    }

    /// Stop when either `self` or `other` signals stop.
    pub fn or(self, other: TerminationPolicy) -> Self {
        TerminationPolicy::Either(Box::new(self), Box::new(other))
    }
}

impl Default for TerminationPolicy {
    /// Three attempts, then stop.
    fn default() -> Self {
        TerminationPolicy::LimitAttempts(3)
    }
}

impl BitAnd for TerminationPolicy {
    type Output = TerminationPolicy;

    fn bitand(self, rhs: TerminationPolicy) -> TerminationPolicy {
        self.and(rhs)
    }
}

impl BitOr for TerminationPolicy {
    type Output = TerminationPolicy;

    fn bitor(self, rhs: TerminationPolicy) -> TerminationPolicy {
        self.or(rhs)
    }
}
