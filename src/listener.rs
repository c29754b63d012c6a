//! The listener capability set.

use crate::error::ProfilerError;
use crate::event::ConnectionEvent;

/// What a listener accumulated over one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordSummary {
    /// Events written to the listener's output.
    pub recorded_events: u64,
}

/// Receives every operation raised on profiled connections.
///
/// Listeners are called synchronously on the thread performing the
/// operation, before the operation reaches the database. Errors and panics
/// are reported through `tracing` by the registry and never reach the caller.
pub trait ConnectionListener: Send + Sync {
    fn on_event(&self, event: &ConnectionEvent<'_>) -> Result<(), ProfilerError>;

    /// The execution being profiled starts.
    fn start_recording(&self) {}

    /// The execution being profiled is over.
    fn stop_recording(&self) {}

    fn find_record(&self) -> Option<RecordSummary> {
        None
    }

    /// Release held resources and stop receiving events. Safe to call more than once.
    fn clean_resources(&self) {}
}
