#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sea_orm::DbErr;
use sea_orm_profiler::{
    Connection, ConnectionSource, CursorOptions, Holdability, PrepareOptions, ProfilingParameters,
    Savepoint,
};

/// In-memory writer shared between a sink and the test reading it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    /// Description lines, without the stack frame lines.
    pub fn descriptions(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| !line.starts_with('\t'))
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn buffered(params: ProfilingParameters) -> (ProfilingParameters, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let params = params.with_sink(move || -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(writer.clone()))
    });
    (params, buffer)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A connection keeping its session state in memory and logging the calls it receives.
#[derive(Default)]
pub struct FakeConnection {
    pub calls: Mutex<Vec<String>>,
    auto_commit: AtomicBool,
    read_only: AtomicBool,
    closed: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_isolation: AtomicBool,
}

impl FakeConnection {
    pub fn new() -> Self {
        let connection = Self::default();
        connection.auto_commit.store(true, Ordering::SeqCst);
        connection
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl Connection for FakeConnection {
    type Statement = String;

    async fn create_statement(&self, _options: Option<CursorOptions>) -> Result<String, DbErr> {
        self.log("create_statement");
        Ok(String::new())
    }

    async fn prepare_statement(&self, sql: &str, _options: PrepareOptions) -> Result<String, DbErr> {
        self.log(format!("prepare_statement {sql}"));
        Ok(sql.to_uppercase())
    }

    async fn prepare_call(&self, sql: &str, _options: Option<CursorOptions>) -> Result<String, DbErr> {
        self.log(format!("prepare_call {sql}"));
        Ok(sql.to_string())
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbErr> {
        self.log(format!("set_auto_commit {auto_commit}"));
        self.auto_commit.store(auto_commit, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbErr> {
        self.log("commit");
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("commit refused".to_string()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbErr> {
        self.log("rollback");
        Ok(())
    }

    async fn close(&self) -> Result<(), DbErr> {
        self.log("close");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn set_read_only(&self, read_only: bool) -> Result<(), DbErr> {
        self.log(format!("set_read_only {read_only}"));
        self.read_only.store(read_only, Ordering::SeqCst);
        Ok(())
    }

    async fn set_catalog(&self, catalog: &str) -> Result<(), DbErr> {
        self.log(format!("set_catalog {catalog}"));
        Ok(())
    }

    async fn set_schema(&self, schema: &str) -> Result<(), DbErr> {
        self.log(format!("set_schema {schema}"));
        Ok(())
    }

    async fn set_transaction_isolation(&self, level: i32) -> Result<(), DbErr> {
        self.log(format!("set_transaction_isolation {level}"));
        Ok(())
    }

    async fn set_holdability(&self, _holdability: Holdability) -> Result<(), DbErr> {
        self.log("set_holdability");
        Ok(())
    }

    async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint, DbErr> {
        self.log("set_savepoint");
        Ok(Savepoint {
            id: 1,
            name: name.map(str::to_string),
        })
    }

    async fn rollback_to_savepoint(&self, _savepoint: &Savepoint) -> Result<(), DbErr> {
        self.log("rollback_to_savepoint");
        Ok(())
    }

    async fn release_savepoint(&self, _savepoint: &Savepoint) -> Result<(), DbErr> {
        self.log("release_savepoint");
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    fn transaction_isolation(&self) -> Result<i32, DbErr> {
        if self.fail_isolation.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("isolation unavailable".to_string()));
        }
        Ok(2)
    }

    fn catalog(&self) -> Option<String> {
        None
    }

    fn schema(&self) -> Option<String> {
        None
    }

    fn holdability(&self) -> Holdability {
        Holdability::default()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Hands out fresh fake connections.
#[derive(Default)]
pub struct FakeSource;

#[async_trait]
impl ConnectionSource for FakeSource {
    type Connection = FakeConnection;

    async fn get_connection(&self) -> Result<FakeConnection, DbErr> {
        Ok(FakeConnection::new())
    }
}
