//! Error classification for retry decisions.
//!
//! Every failure observed by the retry driver is tagged with an
//! [`ErrorClassification`] before any other decision is made. The tag
//! controls whether the driver gives up immediately ([`Fatal`]), retries
//! loudly ([`Recoverable`]), or retries without emitting a `retrying` event
//! ([`SilentlyRecoverable`]).
//!
//! [`Fatal`]: ErrorClassification::Fatal
//! [`Recoverable`]: ErrorClassification::Recoverable
//! [`SilentlyRecoverable`]: ErrorClassification::SilentlyRecoverable

use std::fmt;
use std::sync::Arc;

/// How a failure should be treated by the retry driver.
///
/// # Examples
///
/// ```rust
/// use atmos::ErrorClassification;
///
/// assert!(ErrorClassification::Fatal.is_fatal());
/// assert!(ErrorClassification::SilentlyRecoverable.is_silent());
/// assert_eq!(ErrorClassification::default(), ErrorClassification::Recoverable);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorClassification {
    /// The error cannot be recovered from; propagate it immediately.
    Fatal,
    /// The error is transient; retry and emit a `retrying` event.
    #[default]
    Recoverable,
    /// The error is transient and expected; retry without a `retrying`
    /// event. Useful for noise-level failures that would otherwise flood a
    /// monitor.
    SilentlyRecoverable,
}

impl ErrorClassification {
    /// Returns true if this classification stops retrying unconditionally.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorClassification::Fatal)
    }

    /// Returns true if the `retrying` event should be suppressed.
    pub fn is_silent(self) -> bool {
        matches!(self, ErrorClassification::SilentlyRecoverable)
    }
}

/// Maps errors to an [`ErrorClassification`].
///
/// A classifier wraps a *partial* mapping: the wrapped function may decline
/// to classify an error by returning `None`, in which case [`classify`]
/// falls back to [`ErrorClassification::Recoverable`]. The classifier as a
/// whole is therefore total and never fails.
///
/// Classifiers are cheap to clone and safe to share across policies.
///
/// [`classify`]: ErrorClassifier::classify
///
/// # Examples
///
/// ```rust
/// use atmos::{ErrorClassification, ErrorClassifier};
///
/// #[derive(Debug)]
/// enum ApiError {
///     BadRequest,
///     Unavailable,
/// }
///
/// let classifier = ErrorClassifier::new(|e: &ApiError| match e {
///     ApiError::BadRequest => Some(ErrorClassification::Fatal),
///     _ => None,
/// });
///
/// assert_eq!(classifier.classify(&ApiError::BadRequest), ErrorClassification::Fatal);
/// // Unmatched errors default to Recoverable.
/// assert_eq!(classifier.classify(&ApiError::Unavailable), ErrorClassification::Recoverable);
/// ```
pub struct ErrorClassifier<E> {
    matcher: Arc<dyn Fn(&E) -> Option<ErrorClassification> + Send + Sync>,
}

impl<E> ErrorClassifier<E> {
    /// Create a classifier from a partial mapping.
    ///
    /// Errors for which `matcher` returns `None` classify as
    /// [`ErrorClassification::Recoverable`].
    pub fn new<F>(matcher: F) -> Self
    where
        F: Fn(&E) -> Option<ErrorClassification> + Send + Sync + 'static,
    {
        Self {
            matcher: Arc::new(matcher),
        }
    }

    /// Create a classifier from a total mapping.
    pub fn total<F>(classify: F) -> Self
    where
        F: Fn(&E) -> ErrorClassification + Send + Sync + 'static,
    {
        Self::new(move |error| Some(classify(error)))
    }

    /// Classify errors matching `predicate` as `classification`, leaving
    /// the rest to the default.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atmos::{ErrorClassification, ErrorClassifier};
    ///
    /// let classifier = ErrorClassifier::when(
    ///     |e: &String| e.contains("permission"),
    ///     ErrorClassification::Fatal,
    /// );
    ///
    /// assert!(classifier.classify(&"permission denied".to_string()).is_fatal());
    /// assert!(!classifier.classify(&"timed out".to_string()).is_fatal());
    /// ```
    pub fn when<F>(predicate: F, classification: ErrorClassification) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::new(move |error| predicate(error).then_some(classification))
    }

    /// Classify an error. Total: unmatched errors are
    /// [`ErrorClassification::Recoverable`].
    pub fn classify(&self, error: &E) -> ErrorClassification {
        (self.matcher)(error).unwrap_or_default()
    }

    /// Compose two classifiers by fallback: if `self` declines to classify
    /// an error, `fallback` is consulted. First match wins.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atmos::{ErrorClassification, ErrorClassifier};
    ///
    /// let fatal_on_auth =
    ///     ErrorClassifier::when(|e: &String| e.starts_with("auth"), ErrorClassification::Fatal);
    /// let silent_on_busy = ErrorClassifier::when(
    ///     |e: &String| e.starts_with("busy"),
    ///     ErrorClassification::SilentlyRecoverable,
    /// );
    ///
    /// let classifier = fatal_on_auth.or_else(silent_on_busy);
    /// assert!(classifier.classify(&"auth: bad token".to_string()).is_fatal());
    /// assert!(classifier.classify(&"busy: try later".to_string()).is_silent());
    /// assert_eq!(
    ///     classifier.classify(&"connection reset".to_string()),
    ///     ErrorClassification::Recoverable,
    /// );
    /// ```
    pub fn or_else(self, fallback: ErrorClassifier<E>) -> Self
    where
        E: 'static,
    {
        let primary = self.matcher;
        let secondary = fallback.matcher;
        Self {
            matcher: Arc::new(move |error| primary(error).or_else(|| secondary(error))),
        }
    }
}

impl<E> Default for ErrorClassifier<E> {
    /// The default classifier matches nothing: every error is
    /// [`ErrorClassification::Recoverable`].
    fn default() -> Self {
        Self::new(|_| None)
    }
}

impl<E> Clone for ErrorClassifier<E> {
    fn clone(&self) -> Self {
        Self {
            matcher: Arc::clone(&self.matcher),
        }
    }
}

impl<E> fmt::Debug for ErrorClassifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorClassifier(..)")
    }
}
