//! Monitors that print events to byte streams and character writers.

use std::fmt::{self, Write as FmtWrite};
use std::io::Write as IoWrite;
use std::sync::Mutex;
use std::time::Duration;

use super::{EventMonitor, UNNAMED};

/// How a print monitor renders one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintAction {
    /// Ignore the event.
    Nothing,
    /// Write a single-line summary.
    Message,
    /// Write the summary plus one `caused by:` line per link of the
    /// error's source chain.
    MessageAndCauses,
}

/// Render the event to a string per `action`, or `None` for
/// [`PrintAction::Nothing`]. Shared by the byte-stream and
/// character-writer monitors.
fn render<E: std::error::Error>(
    action: PrintAction,
    name: Option<&str>,
    verb: &str,
    error: &E,
    attempt: u32,
) -> Option<String> {
    if action == PrintAction::Nothing {
        return None;
    }

    let mut text = format!(
        "{} attempt {} {}: {}\n",
        name.unwrap_or(UNNAMED),
        attempt,
        verb,
        error
    );
    if action == PrintAction::MessageAndCauses {
        let mut source = error.source();
        while let Some(cause) = source {
            // String formatting is infallible.
            let _ = writeln!(text, "  caused by: {}", cause);
            source = cause.source();
        }
    }
    Some(text)
}

/// Per-event actions with the documented construction defaults.
#[derive(Debug, Clone, Copy)]
struct Actions {
    retrying: PrintAction,
    interrupted: PrintAction,
    aborted: PrintAction,
}

impl Default for Actions {
    fn default() -> Self {
        Self {
            retrying: PrintAction::Message,
            interrupted: PrintAction::MessageAndCauses,
            aborted: PrintAction::MessageAndCauses,
        }
    }
}

/// Prints events to a byte stream such as stderr or a file.
///
/// The sink lives behind a mutex so a single monitor can be shared across
/// policies and invocations. Write failures are swallowed: a broken sink
/// never disturbs the retry in progress.
///
/// # Examples
///
/// ```rust
/// use atmos::{PrintAction, PrintEvents};
///
/// let monitor = PrintEvents::new(std::io::stderr())
///     .on_retrying(PrintAction::Nothing)
///     .on_aborted(PrintAction::MessageAndCauses);
/// # let _ = monitor;
/// ```
pub struct PrintEvents<W> {
    sink: Mutex<W>,
    actions: Actions,
}

impl<W: IoWrite> PrintEvents<W> {
    /// Print to `sink` with the default actions: message on `retrying`,
    /// message and causes on `interrupted` and `aborted`.
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
            actions: Actions::default(),
        }
    }

    /// Replace the action for `retrying` events.
    pub fn on_retrying(mut self, action: PrintAction) -> Self {
        self.actions.retrying = action;
        self
    }

    /// Replace the action for `interrupted` events.
    pub fn on_interrupted(mut self, action: PrintAction) -> Self {
        self.actions.interrupted = action;
        self
    }

    /// Replace the action for `aborted` events.
    pub fn on_aborted(mut self, action: PrintAction) -> Self {
        self.actions.aborted = action;
        self
    }

    fn print(&self, text: Option<String>) {
        let Some(text) = text else { return };
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.write_all(text.as_bytes());
            let _ = sink.flush();
        }
    }
}

impl<W, E> EventMonitor<E> for PrintEvents<W>
where
    W: IoWrite + Send,
    E: std::error::Error,
{
    fn retrying(&self, name: Option<&str>, error: &E, attempt: u32, _backoff: Duration, _: bool) {
        self.print(render(self.actions.retrying, name, "failed", error, attempt));
    }

    fn interrupted(&self, name: Option<&str>, error: &E, attempt: u32) {
        self.print(render(
            self.actions.interrupted,
            name,
            "interrupted",
            error,
            attempt,
        ));
    }

    fn aborted(&self, name: Option<&str>, error: &E, attempt: u32) {
        self.print(render(self.actions.aborted, name, "aborted", error, attempt));
    }
}

impl<W> fmt::Debug for PrintEvents<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintEvents")
            .field("actions", &self.actions)
            .finish()
    }
}

/// Prints events to a character writer (`std::fmt::Write`), such as a
/// `String`.
///
/// Identical to [`PrintEvents`] apart from the sink type.
pub struct PrintEventsToWriter<W> {
    sink: Mutex<W>,
    actions: Actions,
}

impl<W: FmtWrite> PrintEventsToWriter<W> {
    /// Print to `sink` with the default actions.
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
            actions: Actions::default(),
        }
    }

    /// Replace the action for `retrying` events.
    pub fn on_retrying(mut self, action: PrintAction) -> Self {
        self.actions.retrying = action;
        self
    }

    /// Replace the action for `interrupted` events.
    pub fn on_interrupted(mut self, action: PrintAction) -> Self {
        self.actions.interrupted = action;
        self
    }

    /// Replace the action for `aborted` events.
    pub fn on_aborted(mut self, action: PrintAction) -> Self {
        self.actions.aborted = action;
        self
    }

    /// Run `f` over the sink, e.g. to inspect accumulated output in tests.
    pub fn with_sink<R>(&self, f: impl FnOnce(&W) -> R) -> Option<R> {
        self.sink.lock().ok().map(|sink| f(&sink))
    }

    fn print(&self, text: Option<String>) {
        let Some(text) = text else { return };
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.write_str(&text);
        }
    }
}

impl<W, E> EventMonitor<E> for PrintEventsToWriter<W>
where
    W: FmtWrite + Send,
    E: std::error::Error,
{
    fn retrying(&self, name: Option<&str>, error: &E, attempt: u32, _backoff: Duration, _: bool) {
        self.print(render(self.actions.retrying, name, "failed", error, attempt));
    }

    fn interrupted(&self, name: Option<&str>, error: &E, attempt: u32) {
        self.print(render(
            self.actions.interrupted,
            name,
            "interrupted",
            error,
            attempt,
        ));
    }

    fn aborted(&self, name: Option<&str>, error: &E, attempt: u32) {
        self.print(render(self.actions.aborted, name, "aborted", error, attempt));
    }
}

impl<W> fmt::Debug for PrintEventsToWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintEventsToWriter")
            .field("actions", &self.actions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Outer {
        inner: std::io::Error,
    }

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "outer failure")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.inner)
        }
    }

    fn outer() -> Outer {
        Outer {
            inner: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer"),
        }
    }

    /// Shared buffer usable as an io::Write sink.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl IoWrite for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn message_renders_a_single_line() {
        let buffer = Buffer::default();
        let monitor = PrintEvents::new(buffer.clone());

        monitor.retrying(Some("fetch"), &outer(), 2, Duration::from_millis(10), true);

        assert_eq!(buffer.contents(), "fetch attempt 2 failed: outer failure\n");
    }

    #[test]
    fn unnamed_operations_get_a_placeholder() {
        let buffer = Buffer::default();
        let monitor = PrintEvents::new(buffer.clone());

        monitor.retrying(None, &outer(), 1, Duration::ZERO, true);

        assert!(buffer.contents().starts_with("operation attempt 1 failed"));
    }

    #[test]
    fn aborted_renders_the_cause_chain_by_default() {
        let buffer = Buffer::default();
        let monitor = PrintEvents::new(buffer.clone());

        monitor.aborted(Some("fetch"), &outer(), 3);

        let text = buffer.contents();
        assert!(text.contains("fetch attempt 3 aborted: outer failure"));
        assert!(text.contains("caused by: reset by peer"));
    }

    #[test]
    fn nothing_suppresses_the_event() {
        let buffer = Buffer::default();
        let monitor = PrintEvents::new(buffer.clone()).on_retrying(PrintAction::Nothing);

        monitor.retrying(Some("fetch"), &outer(), 1, Duration::ZERO, true);

        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn writer_monitor_accumulates_into_a_string() {
        let monitor = PrintEventsToWriter::new(String::new());

        monitor.interrupted(Some("upload"), &outer(), 2);

        let text = monitor.with_sink(|s| s.clone()).unwrap();
        assert!(text.contains("upload attempt 2 interrupted: outer failure"));
        assert!(text.contains("caused by: reset by peer"));
    }

    #[test]
    fn writer_monitor_respects_actions() {
        let monitor = PrintEventsToWriter::new(String::new())
            .on_interrupted(PrintAction::Message)
            .on_aborted(PrintAction::Nothing);

        monitor.interrupted(None, &outer(), 1);
        monitor.aborted(None, &outer(), 1);

        let text = monitor.with_sink(|s| s.clone()).unwrap();
        assert!(text.contains("interrupted"));
        assert!(!text.contains("caused by"));
        assert!(!text.contains("aborted"));
    }
}
