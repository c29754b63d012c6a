//! Configuration for connection profiling.

use std::fmt;
use std::sync::Arc;

use crate::sink::{ConsoleSink, SinkFactory};

/// How much of the connection activity gets reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Transaction boundaries, session settings and connection lifecycle.
    #[default]
    Info,
    /// Everything `Info` reports plus statement creation, LOB creation and
    /// the other low-impact operations.
    Trace,
}

/// Which part of an execution gets recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingWindow {
    /// Only between the start and stop signals.
    #[default]
    TestMethodOnly,
    /// Also before the start signal and after the stop signal.
    BeforeAndAfterTestMethod,
}

/// Configuration options for a [`ConnectionProfiler`](crate::ConnectionProfiler).
///
/// Parameters are moved into the profiler when it is built and cannot be
/// changed afterwards.
///
/// # Example
///
/// ```rust
/// use sea_orm_profiler::{Level, ProfilingParameters};
///
/// let params = ProfilingParameters::default()
///     .with_level(Level::Trace)
///     .with_stack_trace_display(true)
///     .with_stack_depth(3);
/// ```
#[derive(Clone)]
pub struct ProfilingParameters {
    /// Verbosity of the recorded trace.
    /// Default: [`Level::Info`]
    pub level: Level,

    /// Recording window.
    /// Default: [`RecordingWindow::TestMethodOnly`]
    pub recording_window: RecordingWindow,

    /// Whether each recorded event is followed by the call site that triggered it.
    /// Default: `false`
    pub display_stack_trace: bool,

    /// Whether frames of the profiler, the runtime and the test harness are
    /// removed from displayed stack traces.
    /// Default: `true`
    pub filter_stack_trace: bool,

    /// Maximum number of stack frames displayed per event.
    /// Default: 5
    pub stack_depth: u16,

    /// Where recorded lines go. Invoked once, when the profiler is built.
    /// Default: standard output
    pub sink: Arc<dyn SinkFactory>,
}

impl Default for ProfilingParameters {
    fn default() -> Self {
        Self {
            level: Level::Info,
            recording_window: RecordingWindow::TestMethodOnly,
            display_stack_trace: false,
            filter_stack_trace: true,
            stack_depth: 5,
            sink: Arc::new(ConsoleSink),
        }
    }
}

impl fmt::Debug for ProfilingParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilingParameters")
            .field("level", &self.level)
            .field("recording_window", &self.recording_window)
            .field("display_stack_trace", &self.display_stack_trace)
            .field("filter_stack_trace", &self.filter_stack_trace)
            .field("stack_depth", &self.stack_depth)
            .finish_non_exhaustive()
    }
}

impl ProfilingParameters {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the verbosity level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the recording window.
    pub fn with_recording_window(mut self, window: RecordingWindow) -> Self {
        self.recording_window = window;
        self
    }

    /// Enable or disable stack trace display after each recorded event.
    pub fn with_stack_trace_display(mut self, enabled: bool) -> Self {
        self.display_stack_trace = enabled;
        self
    }

    /// Enable or disable removal of infrastructure frames from stack traces.
    pub fn with_stack_trace_filter(mut self, enabled: bool) -> Self {
        self.filter_stack_trace = enabled;
        self
    }

    /// Set the maximum number of displayed stack frames.
    pub fn with_stack_depth(mut self, depth: u16) -> Self {
        self.stack_depth = depth;
        self
    }

    /// Set the sink factory.
    pub fn with_sink(mut self, sink: impl SinkFactory + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Record everything, with call sites.
    pub fn detailed() -> Self {
        Self {
            level: Level::Trace,
            display_stack_trace: true,
            ..Self::default()
        }
    }

    /// Record transaction boundaries and session settings only, without call sites.
    pub fn coarse() -> Self {
        Self::default()
    }

    /// Whether events outside the start/stop window are recorded too.
    pub fn records_outside_window(&self) -> bool {
        self.recording_window == RecordingWindow::BeforeAndAfterTestMethod
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ProfilingParameters::default();
        assert_eq!(params.level, Level::Info);
        assert_eq!(params.recording_window, RecordingWindow::TestMethodOnly);
        assert!(!params.display_stack_trace);
        assert!(params.filter_stack_trace);
        assert_eq!(params.stack_depth, 5);
        assert!(!params.records_outside_window());
    }

    #[test]
    fn test_builder() {
        let params = ProfilingParameters::new()
            .with_level(Level::Trace)
            .with_recording_window(RecordingWindow::BeforeAndAfterTestMethod)
            .with_stack_trace_filter(false)
            .with_stack_depth(2);

        assert_eq!(params.level, Level::Trace);
        assert!(params.records_outside_window());
        assert!(!params.filter_stack_trace);
        assert_eq!(params.stack_depth, 2);
    }

    #[test]
    fn test_detailed_preset() {
        let params = ProfilingParameters::detailed();
        assert_eq!(params.level, Level::Trace);
        assert!(params.display_stack_trace);
        assert_eq!(ProfilingParameters::coarse().level, Level::Info);
    }
}
