//! The asynchronous retry driver.

use std::future::Future;

use crate::error::RetryError;
use crate::policy::RetryPolicy;

use super::clock::{AsyncSleeper, Clock};
use super::{assess, shielded, Assessment};

/// Run the future-producing `op` under `policy` without blocking a thread.
///
/// The state machine is the synchronous one; the only suspension points
/// are awaiting the operation's future and awaiting the backoff delay.
/// Each attempt gets a fresh future from `op`; retrying means "try the
/// operation again from scratch".
///
/// Cancellation is dropping the returned future: the in-flight attempt
/// and any pending delay are dropped with it, and no further attempts or
/// events occur. A sleeper that resolves with `Err(SleepInterrupted)`
/// (see [`NotifiedSleeper`](super::NotifiedSleeper)) instead surfaces as
/// [`RetryError::Interrupted`] after an `interrupted` event.
///
/// # Examples
///
/// ```rust
/// use atmos::driver::{run_future, MonotonicClock, TokioSleeper};
/// use atmos::{BackoffPolicy, RetryPolicy};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let policy: RetryPolicy<String> =
///     RetryPolicy::new().with_backoff(BackoffPolicy::constant(Duration::from_millis(1)));
///
/// let mut failures = 1;
/// let result = run_future(&policy, &MonotonicClock, &TokioSleeper, None, || {
///     let fail = failures > 0;
///     failures -= u32::from(fail);
///     async move {
///         if fail {
///             Err("not yet".to_string())
///         } else {
///             Ok(7)
///         }
///     }
/// })
/// .await;
///
/// assert_eq!(result.unwrap(), 7);
/// # });
/// ```
pub async fn run_future<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    clock: &dyn Clock,
    sleeper: &dyn AsyncSleeper,
    name: Option<&str>,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = clock.now();
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let elapsed = clock.now().saturating_duration_since(start);
                match assess(policy, attempt, elapsed, &error) {
                    Assessment::Abort => {
                        shielded(|| policy.monitor().aborted(name, &error, attempt));
                        return Err(RetryError::Aborted {
                            error,
                            attempts: attempt,
                            total_duration: elapsed,
                        });
                    }
                    Assessment::Retry { backoff, silent } => {
                        if !silent {
                            shielded(|| {
                                policy.monitor().retrying(name, &error, attempt, backoff, true)
                            });
                        }
                        if sleeper.sleep(backoff).await.is_err() {
                            shielded(|| policy.monitor().interrupted(name, &error, attempt));
                            return Err(RetryError::Interrupted {
                                error,
                                attempts: attempt,
                                total_duration: clock.now().saturating_duration_since(start),
                            });
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
