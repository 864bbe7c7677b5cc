//! Retry policy: the immutable bundle the drivers execute.

use std::fmt;
use std::sync::Arc;

use crate::backoff::BackoffPolicy;
use crate::classify::ErrorClassifier;
use crate::driver;
use crate::error::RetryError;
use crate::monitor::{EventMonitor, NoopMonitor};
use crate::termination::TerminationPolicy;

/// A declarative description of how an operation is retried.
///
/// A policy bundles the four pluggable axes (termination, backoff,
/// monitor, classifier) and nothing else. Policies are deeply immutable:
/// the only mutation idiom is copy-with-replacement via the `with_*`
/// methods, and cloning is cheap, so one policy can safely drive any
/// number of concurrent retries.
///
/// # Examples
///
/// ```rust
/// use atmos::{BackoffPolicy, RetryPolicy, TerminationPolicy};
/// use std::time::Duration;
///
/// let policy: RetryPolicy<String> = RetryPolicy::new()
///     .with_termination(TerminationPolicy::limit_attempts(5))
///     .with_backoff(BackoffPolicy::exponential(Duration::from_millis(50)));
///
/// let mut calls = 0;
/// let result = policy.retry(Some("flaky"), || {
///     calls += 1;
///     if calls < 3 {
///         Err(format!("failure {}", calls))
///     } else {
///         Ok(42)
///     }
/// });
///
/// assert_eq!(result.unwrap(), 42);
/// assert_eq!(calls, 3);
/// ```
pub struct RetryPolicy<E> {
    termination: TerminationPolicy,
    backoff: BackoffPolicy<E>,
    monitor: Arc<dyn EventMonitor<E>>,
    classifier: ErrorClassifier<E>,
}

impl<E> RetryPolicy<E> {
    /// The default policy: three attempts, Fibonacci backoff from 100 ms,
    /// no monitoring, every error recoverable.
    pub fn new() -> Self {
        Self {
            termination: TerminationPolicy::default(),
            backoff: BackoffPolicy::default(),
            monitor: Arc::new(NoopMonitor),
            classifier: ErrorClassifier::default(),
        }
    }

    /// A policy that never retries: the operation runs once and any error
    /// aborts.
    pub fn never_retry() -> Self {
        Self::new().with_termination(TerminationPolicy::Immediately)
    }

    /// A policy that retries until the operation succeeds or an error is
    /// classified fatal.
    pub fn retry_forever() -> Self {
        Self::new().with_termination(TerminationPolicy::Never)
    }

    /// Replace the termination policy.
    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    /// Replace the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy<E>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the event monitor.
    pub fn with_monitor<M>(mut self, monitor: M) -> Self
    where
        M: EventMonitor<E> + 'static,
    {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Replace the event monitor with one already shared elsewhere.
    pub fn with_shared_monitor(mut self, monitor: Arc<dyn EventMonitor<E>>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Replace the error classifier.
    pub fn with_classifier(mut self, classifier: ErrorClassifier<E>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The termination policy.
    pub fn termination(&self) -> &TerminationPolicy {
        &self.termination
    }

    /// The backoff policy.
    pub fn backoff(&self) -> &BackoffPolicy<E> {
        &self.backoff
    }

    /// The event monitor.
    pub fn monitor(&self) -> &dyn EventMonitor<E> {
        self.monitor.as_ref()
    }

    /// The event monitor as a shareable handle.
    pub fn shared_monitor(&self) -> Arc<dyn EventMonitor<E>> {
        Arc::clone(&self.monitor)
    }

    /// The error classifier.
    pub fn classifier(&self) -> &ErrorClassifier<E> {
        &self.classifier
    }

    /// Run `op` under this policy, blocking the calling thread between
    /// attempts.
    ///
    /// Uses the monotonic system clock and an uninterruptible
    /// `thread::sleep`-based sleeper; use [`driver::run_blocking`] directly
    /// to inject a [`Clock`](crate::driver::Clock) or
    /// [`Sleeper`](crate::driver::Sleeper).
    pub fn retry<T, F>(&self, name: Option<&str>, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        driver::run_blocking(
            self,
            &driver::MonotonicClock,
            &driver::ThreadSleeper,
            name,
            op,
        )
    }

    /// Run the future-producing `op` under this policy without blocking a
    /// thread between attempts.
    ///
    /// Backoff delays go through `tokio::time::sleep`; use
    /// [`driver::run_future`] directly to inject a clock or an
    /// [`AsyncSleeper`](crate::driver::AsyncSleeper). Dropping the returned
    /// future cancels the in-flight attempt and any pending delay; nothing
    /// further runs and no further events are emitted.
    #[cfg(feature = "async")]
    pub async fn retry_async<T, F, Fut>(
        &self,
        name: Option<&str>,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        driver::run_future(
            self,
            &driver::MonotonicClock,
            &driver::TokioSleeper,
            name,
            op,
        )
        .await
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> From<TerminationPolicy> for RetryPolicy<E> {
    /// A policy with the given termination and defaults everywhere else.
    fn from(termination: TerminationPolicy) -> Self {
        Self::new().with_termination(termination)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            termination: self.termination.clone(),
            backoff: self.backoff.clone(),
            monitor: Arc::clone(&self.monitor),
            classifier: self.classifier.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("termination", &self.termination)
            .field("backoff", &self.backoff)
            .field("monitor", &format_args!(".."))
            .field("classifier", &self.classifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorClassification;
    use std::time::Duration;

    #[test]
    fn default_policy_fields() {
        let policy = RetryPolicy::<String>::default();
        assert_eq!(
            policy.termination(),
            &TerminationPolicy::LimitAttempts(3)
        );
        // Default backoff is Fibonacci from 100ms.
        assert_eq!(
            policy.backoff().next_backoff(1, &"e".to_string()),
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.classifier().classify(&"e".to_string()),
            ErrorClassification::Recoverable
        );
    }

    #[test]
    fn never_retry_terminates_immediately() {
        let policy = RetryPolicy::<String>::never_retry();
        assert_eq!(policy.termination(), &TerminationPolicy::Immediately);
    }

    #[test]
    fn retry_forever_never_terminates() {
        let policy = RetryPolicy::<String>::retry_forever();
        assert_eq!(policy.termination(), &TerminationPolicy::Never);
    }

    #[test]
    fn from_termination_sets_only_the_termination() {
        let policy = RetryPolicy::<String>::from(TerminationPolicy::limit_attempts(7));
        assert_eq!(policy.termination(), &TerminationPolicy::LimitAttempts(7));
        assert_eq!(
            policy.backoff().next_backoff(1, &"e".to_string()),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn replacement_returns_an_updated_copy() {
        let policy = RetryPolicy::<String>::new();
        let updated = policy
            .clone()
            .with_termination(TerminationPolicy::limit_attempts(9));

        assert_eq!(policy.termination(), &TerminationPolicy::LimitAttempts(3));
        assert_eq!(updated.termination(), &TerminationPolicy::LimitAttempts(9));
    }

    #[test]
    fn replacing_a_field_with_itself_preserves_behavior() {
        let policy = RetryPolicy::<String>::new()
            .with_backoff(BackoffPolicy::exponential(Duration::from_millis(20)));
        let round_tripped = policy
            .clone()
            .with_termination(policy.termination().clone())
            .with_backoff(policy.backoff().clone())
            .with_classifier(policy.classifier().clone())
            .with_shared_monitor(policy.shared_monitor());

        for attempt in 1..6 {
            assert_eq!(
                policy.backoff().next_backoff(attempt, &"e".to_string()),
                round_tripped
                    .backoff()
                    .next_backoff(attempt, &"e".to_string())
            );
        }
        for next_attempt in 2..6 {
            assert_eq!(
                policy
                    .termination()
                    .should_stop(next_attempt, Duration::ZERO),
                round_tripped
                    .termination()
                    .should_stop(next_attempt, Duration::ZERO)
            );
        }
    }

    #[test]
    fn debug_does_not_require_debug_on_the_monitor() {
        let policy = RetryPolicy::<String>::new();
        let text = format!("{:?}", policy);
        assert!(text.contains("RetryPolicy"));
        assert!(text.contains("termination"));
    }
}
