//! # sea-orm-profiler
//!
//! Connection-level profiling for SeaORM applications and tests.
//!
//! This crate wraps JDBC-style database sessions so that every operation on
//! them (getting the connection, toggling auto-commit and read-only,
//! preparing statements, committing, rolling back, closing...) is reported to
//! registered listeners before it reaches the database. The bundled
//! [`ConnectionProfiler`] turns those reports into a readable trace, each line
//! optionally followed by the call site that triggered it.
//!
//! ## Features
//!
//! - **Transparent**: profiled connections expose the same operations and
//!   return the same results and errors as the wrapped connection
//! - **Fan-out**: any number of listeners, registered and unregistered at any time
//! - **Call sites**: stack traces with profiler, runtime and test harness frames removed
//! - **Execution windows**: record only between start and stop signals, or always
//! - **SeaORM sessions**: [`SeaOrmConnection`] adds JDBC-style session semantics
//!   on top of a `DatabaseConnection`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm_profiler::prelude::*;
//!
//! let db = Database::connect("postgres://localhost/mydb").await?;
//! let registry = ListenerRegistry::global();
//! let source = db.with_profiling(registry.clone());
//!
//! let profiler = ConnectionProfiler::new(ProfilingParameters::detailed(), &registry)?;
//! let session = RecordingSession::start(profiler);
//!
//! let connection = source.get_connection().await?;
//! connection.set_auto_commit(false).await?;
//! connection.commit().await?;
//! connection.close().await?;
//!
//! session.finish();
//! ```
//!
//! ## Output
//!
//! ```text
//! connection 1 - the datasource gets the connection
//!     my_app::repository::find_players(repository.rs:42)
//! connection 1 - auto commit set to false
//!     my_app::repository::find_players(repository.rs:43)
//! connection 1 - commit with transaction_read_committed isolation
//!     my_app::repository::find_players(repository.rs:44)
//! connection 1 - closed
//!     my_app::repository::find_players(repository.rs:45)
//! ```
//!
//! Frame lines start with a tab.

mod config;
mod connection;
mod error;
mod event;
pub mod isolation;
mod listener;
mod profiler;
mod proxy;
mod registry;
mod sea;
mod session;
mod sink;
mod stack;

pub use config::{Level, ProfilingParameters, RecordingWindow};
pub use connection::{
    Concurrency, Connection, ConnectionSource, CursorOptions, GeneratedKeys, Holdability, Lob,
    LobKind, PrepareOptions, ResultSetType, Savepoint, SqlArray, SqlStruct,
};
pub use error::ProfilerError;
pub use event::{ConnectionEvent, ConnectionHandle, ConnectionId, Operation};
pub use listener::{ConnectionListener, RecordSummary};
pub use profiler::ConnectionProfiler;
pub use proxy::{ProfiledConnection, ProfiledSource, ProfilingExt};
pub use registry::ListenerRegistry;
pub use sea::{SeaOrmConnection, SeaOrmSource, SeaOrmStatement};
pub use session::RecordingSession;
pub use sink::{ConsoleSink, FileSink, Sink, SinkFactory};
pub use stack::{StackFrame, StackTrace};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Connection, ConnectionListener, ConnectionProfiler, ConnectionSource, ListenerRegistry,
        ProfiledConnection, ProfiledSource, ProfilingExt, ProfilingParameters, RecordingSession,
    };
}
