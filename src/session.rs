//! Execution window handling for test harnesses.

use std::sync::Arc;

use crate::listener::{ConnectionListener, RecordSummary};

/// Brackets one execution for a listener.
///
/// Starting the session signals the start of the execution; finishing it
/// signals the end, collects the listener's record and releases the
/// listener. Dropping an unfinished session signals the end and releases
/// the listener without collecting anything.
///
/// # Example
///
/// ```rust,ignore
/// let profiler = ConnectionProfiler::new(params, &registry)?;
/// let session = RecordingSession::start(profiler);
///
/// run_test_body().await;
///
/// let summary = session.finish();
/// ```
pub struct RecordingSession {
    listener: Arc<dyn ConnectionListener>,
    finished: bool,
}

impl RecordingSession {
    pub fn start(listener: Arc<dyn ConnectionListener>) -> Self {
        listener.start_recording();
        Self {
            listener,
            finished: false,
        }
    }

    pub fn listener(&self) -> &Arc<dyn ConnectionListener> {
        &self.listener
    }

    pub fn finish(mut self) -> Option<RecordSummary> {
        self.finished = true;
        self.listener.stop_recording();
        let record = self.listener.find_record();
        self.listener.clean_resources();
        record
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if !self.finished {
            self.listener.stop_recording();
            self.listener.clean_resources();
        }
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfilerError;
    use crate::event::ConnectionEvent;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Signals(Mutex<Vec<&'static str>>);

    impl ConnectionListener for Signals {
        fn on_event(&self, _event: &ConnectionEvent<'_>) -> Result<(), ProfilerError> {
            Ok(())
        }

        fn start_recording(&self) {
            self.0.lock().unwrap().push("start");
        }

        fn stop_recording(&self) {
            self.0.lock().unwrap().push("stop");
        }

        fn find_record(&self) -> Option<RecordSummary> {
            self.0.lock().unwrap().push("find");
            Some(RecordSummary { recorded_events: 3 })
        }

        fn clean_resources(&self) {
            self.0.lock().unwrap().push("clean");
        }
    }

    #[test]
    fn test_finish_signals_in_order() {
        let signals = Arc::new(Signals::default());
        let session = RecordingSession::start(signals.clone());

        assert_eq!(session.finish(), Some(RecordSummary { recorded_events: 3 }));
        assert_eq!(*signals.0.lock().unwrap(), vec!["start", "stop", "find", "clean"]);
    }

    #[test]
    fn test_drop_stops_and_cleans() {
        let signals = Arc::new(Signals::default());
        drop(RecordingSession::start(signals.clone()));

        assert_eq!(*signals.0.lock().unwrap(), vec!["start", "stop", "clean"]);
    }
}
