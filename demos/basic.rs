//! Basic example showing how to profile the connection calls of a unit of work.
//!
//! Run with: cargo run --example basic
//!
//! Uses a mock database unless `DATABASE_URL` points to a PostgreSQL server.

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, MockDatabase, MockExecResult};
use sea_orm_profiler::prelude::*;
use sea_orm_profiler::PrepareOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn connect() -> Result<DatabaseConnection, sea_orm::DbErr> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            tracing::info!("Connecting to database...");
            Database::connect(&url).await
        }
        Err(_) => Ok(MockDatabase::new(DbBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sea_orm_profiler=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = connect().await?;

    // Option 1: Report to the process-wide registry
    let source = db.with_global_profiling();

    // Option 2: Report to a registry of your own
    // let registry = Arc::new(ListenerRegistry::new());
    // let source = db.with_profiling(registry.clone());

    // Option 3: Write the trace to a file instead of stdout
    // let params = ProfilingParameters::detailed()
    //     .with_sink(FileSink::new("target/connection-profiling.txt"));

    let profiler = ConnectionProfiler::new(ProfilingParameters::detailed(), source.registry())?;
    let session = RecordingSession::start(profiler);

    let connection = source.get_connection().await?;
    connection.set_auto_commit(false).await?;
    let stmt = connection
        .prepare_statement("UPDATE player SET active = $1", PrepareOptions::Plain)
        .await?;
    connection.execute(stmt.bind([true.into()])?).await?;
    connection.commit().await?;
    connection.set_auto_commit(true).await?;
    connection.close().await?;

    if let Some(summary) = session.finish() {
        tracing::info!(recorded_events = summary.recorded_events, "profiling finished");
    }

    source.into_inner().close().await?;

    Ok(())
}
