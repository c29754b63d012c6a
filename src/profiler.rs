//! The connection profiler: writes one line per recorded operation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::config::{Level, ProfilingParameters};
use crate::error::ProfilerError;
use crate::event::{ConnectionEvent, Operation};
use crate::listener::{ConnectionListener, RecordSummary};
use crate::registry::ListenerRegistry;
use crate::sink::Sink;
use crate::stack::StackTrace;

/// A listener writing a human-readable trace of connection operations.
///
/// Each recorded operation produces a `connection <id> - <description>` line,
/// optionally followed by the call site that triggered it, one tab-prefixed
/// frame per line. A profiler profiles a single execution: it is armed by
/// [`start_recording`](ConnectionListener::start_recording), disarmed by
/// [`stop_recording`](ConnectionListener::stop_recording) and cannot be reset.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm_profiler::{ConnectionProfiler, ListenerRegistry, ProfilingParameters};
///
/// let registry = ListenerRegistry::global();
/// let profiler = ConnectionProfiler::new(ProfilingParameters::detailed(), &registry)?;
///
/// profiler.start_recording();
/// // ... run the code being profiled ...
/// profiler.stop_recording();
/// profiler.clean_resources();
/// ```
pub struct ConnectionProfiler {
    params: ProfilingParameters,
    sink: Sink,
    registry: Weak<ListenerRegistry>,
    started: AtomicBool,
    stopped: AtomicBool,
    released: AtomicBool,
    recorded_events: AtomicU64,
}

impl ConnectionProfiler {
    /// Build the sink and register the profiler with `registry`.
    ///
    /// Fails if the sink cannot be built; nothing is registered in that case.
    pub fn new(
        params: ProfilingParameters,
        registry: &Arc<ListenerRegistry>,
    ) -> Result<Arc<Self>, ProfilerError> {
        let sink = Sink::open(params.sink.as_ref()).map_err(ProfilerError::Sink)?;
        let profiler = Arc::new(Self {
            params,
            sink,
            registry: Arc::downgrade(registry),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            released: AtomicBool::new(false),
            recorded_events: AtomicU64::new(0),
        });
        registry.register(profiler.clone());
        tracing::debug!(params = ?profiler.params, "connection profiler registered");
        Ok(profiler)
    }

    pub fn params(&self) -> &ProfilingParameters {
        &self.params
    }

    /// Whether an operation raised now would be written.
    pub fn should_record(&self, operation: &Operation<'_>) -> bool {
        let level_allows = self.params.level == Level::Trace || !operation.is_detailed();
        level_allows && (self.params.records_outside_window() || self.in_window())
    }

    fn in_window(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.stopped.load(Ordering::Acquire)
    }

    fn record(&self, event: &ConnectionEvent<'_>) -> Result<(), ProfilerError> {
        let mut lines = vec![event.to_string()];
        if self.params.display_stack_trace {
            lines.extend(self.call_site().to_lines());
        }
        self.sink.write_lines(&lines).map_err(ProfilerError::Write)?;
        self.recorded_events.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn call_site(&self) -> StackTrace {
        let trace = StackTrace::capture();
        let trace = if self.params.filter_stack_trace {
            trace.filter_infrastructure()
        } else {
            trace
        };
        trace.limit_depth(usize::from(self.params.stack_depth))
    }
}

impl ConnectionListener for ConnectionProfiler {
    fn on_event(&self, event: &ConnectionEvent<'_>) -> Result<(), ProfilerError> {
        if self.should_record(&event.operation) {
            self.record(event)?;
        }
        Ok(())
    }

    fn start_recording(&self) {
        self.started.store(true, Ordering::Release);
        tracing::debug!("connection profiling started");
    }

    fn stop_recording(&self) {
        self.stopped.store(true, Ordering::Release);
        tracing::debug!(
            recorded_events = self.recorded_events.load(Ordering::Relaxed),
            "connection profiling stopped"
        );
    }

    fn find_record(&self) -> Option<RecordSummary> {
        Some(RecordSummary {
            recorded_events: self.recorded_events.load(Ordering::Relaxed),
        })
    }

    fn clean_resources(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self);
        }
    }
}

impl std::fmt::Debug for ConnectionProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfiler")
            .field("params", &self.params)
            .field("started", &self.started)
            .field("stopped", &self.stopped)
            .field("recorded_events", &self.recorded_events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordingWindow;
    use crate::connection::{LobKind, PrepareOptions};
    use crate::event::{ConnectionHandle, ConnectionId};
    use sea_orm::DbErr;
    use std::io::{self, Write};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    struct Handle(ConnectionId);

    impl ConnectionHandle for Handle {
        fn id(&self) -> ConnectionId {
            self.0
        }

        fn current_isolation(&self) -> Result<i32, DbErr> {
            Ok(2)
        }
    }

    fn profiler(params: ProfilingParameters) -> (Arc<ConnectionProfiler>, Buffer, Arc<ListenerRegistry>) {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let params = params.with_sink(move || -> io::Result<Box<dyn Write + Send>> {
            Ok(Box::new(writer.clone()))
        });
        let registry = Arc::new(ListenerRegistry::new());
        let profiler = ConnectionProfiler::new(params, &registry).unwrap();
        (profiler, buffer, registry)
    }

    #[test]
    fn test_registers_on_creation_and_unregisters_on_cleanup() {
        let (profiler, _, registry) = profiler(ProfilingParameters::default());
        assert_eq!(registry.len(), 1);

        profiler.clean_resources();
        profiler.clean_resources();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sink_failure_is_fatal() {
        let registry = Arc::new(ListenerRegistry::new());
        let params = ProfilingParameters::default().with_sink(|| -> io::Result<Box<dyn Write + Send>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        });

        let err = ConnectionProfiler::new(params, &registry).unwrap_err();
        assert!(matches!(err, ProfilerError::Sink(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_window_gating() {
        let (profiler, buffer, registry) = profiler(ProfilingParameters::default());
        let handle = Handle(ConnectionId::next());
        let commit = ConnectionEvent::new(&handle, Operation::Commit);

        registry.dispatch(&commit);
        assert!(buffer.lines().is_empty());

        profiler.start_recording();
        registry.dispatch(&commit);
        assert_eq!(buffer.lines().len(), 1);

        profiler.stop_recording();
        registry.dispatch(&commit);
        assert_eq!(buffer.lines().len(), 1);
        assert_eq!(profiler.find_record(), Some(RecordSummary { recorded_events: 1 }));
    }

    #[test]
    fn test_always_window_records_outside() {
        let params = ProfilingParameters::default()
            .with_recording_window(RecordingWindow::BeforeAndAfterTestMethod);
        let (_profiler, buffer, registry) = profiler(params);
        let handle = Handle(ConnectionId::next());

        registry.dispatch(&ConnectionEvent::new(&handle, Operation::Rollback));
        assert_eq!(buffer.lines(), vec![format!("connection {} - rollback", handle.0)]);
    }

    #[test]
    fn test_info_level_skips_detailed_operations() {
        let (profiler, buffer, registry) = profiler(ProfilingParameters::coarse());
        profiler.start_recording();
        let handle = Handle(ConnectionId::next());
        let plain = PrepareOptions::Plain;

        registry.dispatch(&ConnectionEvent::new(
            &handle,
            Operation::PrepareStatement {
                sql: "select 1",
                options: &plain,
            },
        ));
        registry.dispatch(&ConnectionEvent::new(&handle, Operation::CreateLob(LobKind::Blob)));
        registry.dispatch(&ConnectionEvent::new(&handle, Operation::SetAutoCommit(false)));

        assert_eq!(
            buffer.lines(),
            vec![format!("connection {} - auto commit set to false", handle.0)]
        );
    }

    #[test]
    fn test_trace_level_records_detailed_operations() {
        let params = ProfilingParameters::default().with_level(Level::Trace);
        let (profiler, buffer, registry) = profiler(params);
        profiler.start_recording();
        let handle = Handle(ConnectionId::next());

        registry.dispatch(&ConnectionEvent::new(&handle, Operation::CreateLob(LobKind::Clob)));
        assert_eq!(buffer.lines(), vec![format!("connection {} - create CLOB", handle.0)]);
    }

    #[test]
    fn test_stack_lines_follow_description() {
        let params = ProfilingParameters::detailed()
            .with_stack_trace_filter(false)
            .with_stack_depth(2);
        let (profiler, buffer, registry) = profiler(params);
        profiler.start_recording();
        let handle = Handle(ConnectionId::next());

        registry.dispatch(&ConnectionEvent::new(&handle, Operation::Close));

        let lines = buffer.lines();
        assert_eq!(lines[0], format!("connection {} - closed", handle.0));
        assert!(lines.len() <= 3);
        assert!(lines[1..].iter().all(|line| line.starts_with('\t')));
    }
}
