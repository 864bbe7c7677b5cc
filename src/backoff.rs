//! Backoff policies: how long to wait between attempts.
//!
//! A [`BackoffPolicy`] is a pure function from the 1-based attempt index
//! and the most recent error to a non-negative delay. Built-in policies are
//! deterministic; [`Randomized`](BackoffPolicy::Randomized) perturbs an
//! inner policy by a uniform draw from a [`JitterRange`], and
//! [`Selected`](BackoffPolicy::Selected) picks a policy per error.
//!
//! All computed delays are rounded to the nearest nanosecond and saturated
//! at [`MAX_BACKOFF`]; no policy ever yields a negative or non-finite
//! delay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Ceiling on every computed backoff: one year.
///
/// Exponential and Fibonacci growth overflow quickly; rather than wrap or
/// panic, delays saturate here.
pub const MAX_BACKOFF: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Base delay used by [`BackoffPolicy::default`].
const DEFAULT_BASE: Duration = Duration::from_millis(100);

/// Multiplier used by the Fibonacci policy: the 8/5 approximation of the
/// golden ratio, so delays grow like a Fibonacci sequence without integer
/// bookkeeping.
const FIBONACCI_FACTOR: f64 = 8.0 / 5.0;

/// A signed interval of nanosecond offsets for randomized backoff.
///
/// `std::time::Duration` cannot be negative, so jitter offsets are carried
/// as signed nanoseconds. A range constructed with reversed endpoints is
/// normalized by swapping them.
///
/// # Examples
///
/// ```rust
/// use atmos::JitterRange;
/// use std::time::Duration;
///
/// // [0ms, +50ms]
/// let up = JitterRange::up_to(Duration::from_millis(50));
/// // [-50ms, +50ms]
/// let sym = JitterRange::symmetric(Duration::from_millis(50));
/// // Reversed endpoints are swapped.
/// assert_eq!(JitterRange::from_millis(10, -10), JitterRange::from_millis(-10, 10));
/// # let _ = (up, sym);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    lo_nanos: i64,
    hi_nanos: i64,
}

impl JitterRange {
    /// Build a range from signed nanosecond endpoints.
    ///
    /// Reversed endpoints (`lo > hi`) are normalized by swapping.
    pub fn from_nanos(lo: i64, hi: i64) -> Self {
        if lo <= hi {
            Self {
                lo_nanos: lo,
                hi_nanos: hi,
            }
        } else {
            Self {
                lo_nanos: hi,
                hi_nanos: lo,
            }
        }
    }

    /// Build a range from signed millisecond endpoints.
    ///
    /// Reversed endpoints are normalized by swapping.
    pub fn from_millis(lo: i64, hi: i64) -> Self {
        Self::from_nanos(
            lo.saturating_mul(1_000_000),
            hi.saturating_mul(1_000_000),
        )
    }

    /// The range `[0, bound]`: only ever lengthen the delay.
    pub fn up_to(bound: Duration) -> Self {
        Self::from_nanos(0, saturating_nanos(bound))
    }

    /// The range `[-spread, +spread]`.
    pub fn symmetric(spread: Duration) -> Self {
        let nanos = saturating_nanos(spread);
        Self::from_nanos(nanos.saturating_neg(), nanos)
    }

    /// Lower endpoint in nanoseconds.
    pub fn lo_nanos(&self) -> i64 {
        self.lo_nanos
    }

    /// Upper endpoint in nanoseconds.
    pub fn hi_nanos(&self) -> i64 {
        self.hi_nanos
    }

    /// Draw a uniform offset and add it to `base`, clamping the result to
    /// `[0, MAX_BACKOFF]`.
    fn apply(&self, base: Duration) -> Duration {
        let offset = rand::thread_rng().gen_range(self.lo_nanos..=self.hi_nanos);
        let nanos = base.as_nanos() as i128 + i128::from(offset);
        if nanos <= 0 {
            Duration::ZERO
        } else if nanos >= MAX_BACKOFF.as_nanos() as i128 {
            MAX_BACKOFF
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }
}

impl From<Duration> for JitterRange {
    /// `bound` is shorthand for the range `[0, bound]`.
    fn from(bound: Duration) -> Self {
        Self::up_to(bound)
    }
}

fn saturating_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// The delay between the end of one attempt and the start of the next.
///
/// Policies are pure data over the error type `E`; evaluation happens via
/// [`next_backoff`](BackoffPolicy::next_backoff). Cloning is cheap.
///
/// # Examples
///
/// ```rust
/// use atmos::BackoffPolicy;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(100);
/// let linear = BackoffPolicy::<String>::linear(base);
/// let exponential = BackoffPolicy::<String>::exponential(base);
///
/// let err = "boom".to_string();
/// assert_eq!(linear.next_backoff(3, &err), Duration::from_millis(300));
/// assert_eq!(exponential.next_backoff(3, &err), Duration::from_millis(400));
/// ```
pub enum BackoffPolicy<E> {
    /// The same delay before every retry.
    Constant(Duration),
    /// `base * attempt`: delays grow arithmetically.
    Linear(Duration),
    /// `base * 2^(attempt - 1)`: delays double.
    Exponential(Duration),
    /// `base * (8/5)^(attempt - 1)`: delays grow like a Fibonacci
    /// sequence.
    Fibonacci(Duration),
    /// Pick a policy per error. The selector runs on every call; nothing is
    /// cached.
    Selected(Arc<dyn Fn(&E) -> BackoffPolicy<E> + Send + Sync>),
    /// An inner policy perturbed by a uniform draw from `range`.
    Randomized {
        /// The policy whose output is perturbed.
        inner: Box<BackoffPolicy<E>>,
        /// The interval the offset is drawn from.
        range: JitterRange,
    },
}

impl<E> BackoffPolicy<E> {
    /// A constant delay.
    pub fn constant(base: Duration) -> Self {
        BackoffPolicy::Constant(base)
    }

    /// A linearly growing delay: `base * attempt`.
    pub fn linear(base: Duration) -> Self {
        BackoffPolicy::Linear(base)
    }

    /// A doubling delay: `base * 2^(attempt - 1)`.
    pub fn exponential(base: Duration) -> Self {
        BackoffPolicy::Exponential(base)
    }

    /// A Fibonacci-like delay: `base * (8/5)^(attempt - 1)`.
    pub fn fibonacci(base: Duration) -> Self {
        BackoffPolicy::Fibonacci(base)
    }

    /// Delegate the choice of policy to `select`, called with the most
    /// recent error on every evaluation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atmos::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// // Back off harder when the server says it is overloaded.
    /// let policy = BackoffPolicy::selected(|e: &String| {
    ///     if e.contains("overloaded") {
    ///         BackoffPolicy::exponential(Duration::from_secs(1))
    ///     } else {
    ///         BackoffPolicy::constant(Duration::from_millis(50))
    ///     }
    /// });
    ///
    /// assert_eq!(
    ///     policy.next_backoff(2, &"overloaded".to_string()),
    ///     Duration::from_secs(2),
    /// );
    /// assert_eq!(
    ///     policy.next_backoff(2, &"reset".to_string()),
    ///     Duration::from_millis(50),
    /// );
    /// ```
    pub fn selected<F>(select: F) -> Self
    where
        F: Fn(&E) -> BackoffPolicy<E> + Send + Sync + 'static,
    {
        BackoffPolicy::Selected(Arc::new(select))
    }

    /// Perturb this policy's output by a uniform draw from `range`.
    ///
    /// A plain `Duration` converts to the range `[0, bound]`; use
    /// [`JitterRange::symmetric`] or [`JitterRange::from_millis`] for
    /// ranges that can shorten the delay. The perturbed delay is clamped to
    /// `[0, MAX_BACKOFF]`; no negative duration is ever produced.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atmos::{BackoffPolicy, JitterRange};
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::<String>::linear(Duration::from_millis(100))
    ///     .randomized(JitterRange::symmetric(Duration::from_millis(50)));
    ///
    /// let delay = policy.next_backoff(1, &"e".to_string());
    /// assert!(delay >= Duration::from_millis(50));
    /// assert!(delay <= Duration::from_millis(150));
    /// ```
    pub fn randomized<R: Into<JitterRange>>(self, range: R) -> Self {
        BackoffPolicy::Randomized {
            inner: Box::new(self),
            range: range.into(),
        }
    }

    /// Compute the delay before the attempt after `attempt`.
    ///
    /// `attempt` is the 1-based index of the attempt that just failed;
    /// values below 1 are treated as 1. The result is always in
    /// `[0, MAX_BACKOFF]`.
    pub fn next_backoff(&self, attempt: u32, last_error: &E) -> Duration {
        let attempt = attempt.max(1);
        match self {
            BackoffPolicy::Constant(base) => (*base).min(MAX_BACKOFF),
            BackoffPolicy::Linear(base) => base.saturating_mul(attempt).min(MAX_BACKOFF),
            BackoffPolicy::Exponential(base) => scaled(*base, 2f64.powi(exponent(attempt))),
            BackoffPolicy::Fibonacci(base) => {
                scaled(*base, FIBONACCI_FACTOR.powi(exponent(attempt)))
            }
            BackoffPolicy::Selected(select) => {
                select(last_error).next_backoff(attempt, last_error)
            }
            BackoffPolicy::Randomized { inner, range } => {
                range.apply(inner.next_backoff(attempt, last_error))
            }
        }
    }
}

/// Growth exponent for attempt `attempt`, capped where the factor is
/// already far past the saturation ceiling.
fn exponent(attempt: u32) -> i32 {
    (attempt - 1).min(1024) as i32
}

/// Multiply a base delay by a float factor in nanosecond space, rounding to
/// the nearest nanosecond and saturating at [`MAX_BACKOFF`].
fn scaled(base: Duration, factor: f64) -> Duration {
    let nanos = base.as_nanos() as f64 * factor;
    if !nanos.is_finite() || nanos >= MAX_BACKOFF.as_nanos() as f64 {
        MAX_BACKOFF
    } else if nanos <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(nanos.round() as u64)
    }
}

impl<E> Default for BackoffPolicy<E> {
    /// Fibonacci growth from a 100 ms base.
    fn default() -> Self {
        BackoffPolicy::Fibonacci(DEFAULT_BASE)
    }
}

impl<E> Clone for BackoffPolicy<E> {
    fn clone(&self) -> Self {
        match self {
            BackoffPolicy::Constant(base) => BackoffPolicy::Constant(*base),
            BackoffPolicy::Linear(base) => BackoffPolicy::Linear(*base),
            BackoffPolicy::Exponential(base) => BackoffPolicy::Exponential(*base),
            BackoffPolicy::Fibonacci(base) => BackoffPolicy::Fibonacci(*base),
            BackoffPolicy::Selected(select) => BackoffPolicy::Selected(Arc::clone(select)),
            BackoffPolicy::Randomized { inner, range } => BackoffPolicy::Randomized {
                inner: inner.clone(),
                range: *range,
            },
        }
    }
}

impl<E> fmt::Debug for BackoffPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffPolicy::Constant(base) => f.debug_tuple("Constant").field(base).finish(),
            BackoffPolicy::Linear(base) => f.debug_tuple("Linear").field(base).finish(),
            BackoffPolicy::Exponential(base) => {
                f.debug_tuple("Exponential").field(base).finish()
            }
            BackoffPolicy::Fibonacci(base) => f.debug_tuple("Fibonacci").field(base).finish(),
            BackoffPolicy::Selected(_) => f.write_str("Selected(..)"),
            BackoffPolicy::Randomized { inner, range } => f
                .debug_struct("Randomized")
                .field("inner", inner)
                .field("range", range)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERR: &str = "err";

    #[test]
    fn constant_ignores_the_attempt_index() {
        let policy = BackoffPolicy::<&str>::constant(Duration::from_millis(100));
        assert_eq!(policy.next_backoff(1, &ERR), Duration::from_millis(100));
        assert_eq!(policy.next_backoff(7, &ERR), Duration::from_millis(100));
    }

    #[test]
    fn linear_scales_with_the_attempt_index() {
        let policy = BackoffPolicy::<&str>::linear(Duration::from_millis(100));
        assert_eq!(policy.next_backoff(1, &ERR), Duration::from_millis(100));
        assert_eq!(policy.next_backoff(2, &ERR), Duration::from_millis(200));
        assert_eq!(policy.next_backoff(5, &ERR), Duration::from_millis(500));
    }

    #[test]
    fn exponential_doubles() {
        let policy = BackoffPolicy::<&str>::exponential(Duration::from_millis(100));
        assert_eq!(policy.next_backoff(1, &ERR), Duration::from_millis(100));
        assert_eq!(policy.next_backoff(2, &ERR), Duration::from_millis(200));
        assert_eq!(policy.next_backoff(3, &ERR), Duration::from_millis(400));
        assert_eq!(policy.next_backoff(4, &ERR), Duration::from_millis(800));
    }

    #[test]
    fn fibonacci_grows_by_the_golden_ratio_approximation() {
        let policy = BackoffPolicy::<&str>::fibonacci(Duration::from_millis(100));
        assert_eq!(policy.next_backoff(1, &ERR), Duration::from_millis(100));
        assert_eq!(policy.next_backoff(2, &ERR), Duration::from_millis(160));
        assert_eq!(policy.next_backoff(3, &ERR), Duration::from_millis(256));
    }

    #[test]
    fn exponential_saturates_at_the_ceiling() {
        let policy = BackoffPolicy::<&str>::exponential(Duration::from_secs(1));
        assert_eq!(policy.next_backoff(200, &ERR), MAX_BACKOFF);
    }

    #[test]
    fn fibonacci_saturates_at_the_ceiling() {
        let policy = BackoffPolicy::<&str>::fibonacci(Duration::from_secs(1));
        assert_eq!(policy.next_backoff(500, &ERR), MAX_BACKOFF);
    }

    #[test]
    fn attempt_zero_is_treated_as_one() {
        let policy = BackoffPolicy::<&str>::linear(Duration::from_millis(100));
        assert_eq!(policy.next_backoff(0, &ERR), policy.next_backoff(1, &ERR));
    }

    #[test]
    fn selected_dispatches_on_the_error() {
        let policy = BackoffPolicy::selected(|e: &&str| {
            if e.starts_with("slow") {
                BackoffPolicy::constant(Duration::from_secs(1))
            } else {
                BackoffPolicy::constant(Duration::from_millis(10))
            }
        });

        assert_eq!(policy.next_backoff(1, &"slow down"), Duration::from_secs(1));
        assert_eq!(policy.next_backoff(1, &"reset"), Duration::from_millis(10));
    }

    #[test]
    fn randomized_stays_within_the_range() {
        let policy = BackoffPolicy::<&str>::linear(Duration::from_millis(100))
            .randomized(JitterRange::symmetric(Duration::from_millis(50)));

        for _ in 0..200 {
            let d1 = policy.next_backoff(1, &ERR);
            assert!(d1 >= Duration::from_millis(50) && d1 <= Duration::from_millis(150));

            let d5 = policy.next_backoff(5, &ERR);
            assert!(d5 >= Duration::from_millis(450) && d5 <= Duration::from_millis(550));
        }
    }

    #[test]
    fn randomized_never_goes_negative() {
        // Offsets can exceed the inner delay; the result clamps to zero.
        let policy = BackoffPolicy::<&str>::constant(Duration::from_millis(1))
            .randomized(JitterRange::from_millis(-100, -50));

        for _ in 0..100 {
            assert_eq!(policy.next_backoff(1, &ERR), Duration::ZERO);
        }
    }

    #[test]
    fn duration_converts_to_an_up_to_range() {
        let policy =
            BackoffPolicy::<&str>::constant(Duration::from_millis(100)).randomized(Duration::from_millis(20));

        for _ in 0..100 {
            let d = policy.next_backoff(1, &ERR);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(120));
        }
    }

    #[test]
    fn reversed_jitter_range_is_normalized() {
        let range = JitterRange::from_millis(50, -50);
        assert_eq!(range.lo_nanos(), -50_000_000);
        assert_eq!(range.hi_nanos(), 50_000_000);
    }

    #[test]
    fn empty_jitter_range_is_a_fixed_offset() {
        let policy = BackoffPolicy::<&str>::constant(Duration::from_millis(100))
            .randomized(JitterRange::from_millis(25, 25));
        assert_eq!(policy.next_backoff(1, &ERR), Duration::from_millis(125));
    }

    #[test]
    fn default_is_fibonacci_100ms() {
        let policy = BackoffPolicy::<&str>::default();
        assert_eq!(policy.next_backoff(1, &ERR), Duration::from_millis(100));
        assert_eq!(policy.next_backoff(2, &ERR), Duration::from_millis(160));
    }

    #[test]
    fn deterministic_policies_are_idempotent() {
        let policies = [
            BackoffPolicy::<&str>::constant(Duration::from_millis(70)),
            BackoffPolicy::linear(Duration::from_millis(70)),
            BackoffPolicy::exponential(Duration::from_millis(70)),
            BackoffPolicy::fibonacci(Duration::from_millis(70)),
        ];

        for policy in &policies {
            for attempt in 1..10 {
                assert_eq!(
                    policy.next_backoff(attempt, &ERR),
                    policy.next_backoff(attempt, &ERR)
                );
            }
        }
    }

    #[test]
    fn clone_preserves_behavior() {
        let policy = BackoffPolicy::<&str>::exponential(Duration::from_millis(30));
        let cloned = policy.clone();
        for attempt in 1..8 {
            assert_eq!(
                policy.next_backoff(attempt, &ERR),
                cloned.next_backoff(attempt, &ERR)
            );
        }
    }
}
