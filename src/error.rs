//! Error types for profiling setup and recording.

use std::io;

use thiserror::Error;

/// Errors raised by the profiler itself.
///
/// Connection operations keep reporting SeaORM's [`DbErr`](sea_orm::DbErr);
/// these errors never replace them.
#[derive(Debug, Error)]
pub enum ProfilerError {
    /// The sink could not be built. Raised while the profiler is set up.
    #[error("failed to build profiling sink: {0}")]
    Sink(#[source] io::Error),

    /// A recorded line could not be written.
    #[error("failed to write profiling output: {0}")]
    Write(#[source] io::Error),

    /// A listener failed while handling an event.
    #[error("connection listener failed: {0}")]
    Listener(String),
}

impl ProfilerError {
    /// Create a listener failure from any message.
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }
}
