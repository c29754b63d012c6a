//! JDBC-style sessions on top of a SeaORM `DatabaseConnection`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    ExecResult, QueryResult, Statement, TransactionTrait, Value,
};

use crate::connection::{
    Connection, ConnectionSource, CursorOptions, Holdability, PrepareOptions, Savepoint,
};
use crate::isolation::{
    isolation_level, TRANSACTION_READ_COMMITTED, TRANSACTION_REPEATABLE_READ,
    TRANSACTION_SERIALIZABLE,
};

/// Hands out [`SeaOrmConnection`] sessions sharing one SeaORM connection pool.
#[derive(Debug, Clone)]
pub struct SeaOrmSource {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSource {
    pub fn new(db: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { db: db.into() }
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Close the underlying pool. Sessions handed out earlier stop working.
    pub async fn close(self) -> Result<(), DbErr> {
        self.db.close_by_ref().await
    }
}

impl From<DatabaseConnection> for SeaOrmSource {
    fn from(db: DatabaseConnection) -> Self {
        Self::new(db)
    }
}

#[async_trait]
impl ConnectionSource for SeaOrmSource {
    type Connection = SeaOrmConnection;

    async fn get_connection(&self) -> Result<Self::Connection, DbErr> {
        Ok(SeaOrmConnection::new(Arc::clone(&self.db)))
    }
}

/// A statement created or prepared by a [`SeaOrmConnection`].
///
/// Turn it into a SeaORM [`Statement`] and run it through the connection's
/// [`ConnectionTrait`] implementation.
#[derive(Debug, Clone)]
pub struct SeaOrmStatement {
    backend: DbBackend,
    sql: Option<String>,
    cursor: Option<CursorOptions>,
}

impl SeaOrmStatement {
    /// SQL given at preparation time. `None` for created statements.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn cursor(&self) -> Option<CursorOptions> {
        self.cursor
    }

    /// Bind values to the prepared SQL.
    pub fn bind<I>(&self, values: I) -> Result<Statement, DbErr>
    where
        I: IntoIterator<Item = Value>,
    {
        let sql = self
            .sql
            .as_deref()
            .ok_or_else(|| DbErr::Custom("statement was not prepared with SQL".to_string()))?;
        Ok(Statement::from_sql_and_values(self.backend, sql, values))
    }

    /// Build a statement for SQL given at execution time.
    pub fn query(&self, sql: &str) -> Statement {
        Statement::from_string(self.backend, sql)
    }
}

/// Quote an identifier for `backend`, doubling embedded quote characters.
fn quote_identifier(backend: DbBackend, name: &str) -> String {
    match backend {
        DbBackend::MySql => format!("`{}`", name.replace('`', "``")),
        DbBackend::Postgres | DbBackend::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

#[derive(Debug)]
struct SessionState {
    auto_commit: bool,
    read_only: bool,
    isolation: i32,
    catalog: Option<String>,
    schema: Option<String>,
    holdability: Holdability,
    closed: bool,
    next_savepoint: u32,
}

/// A JDBC-style session on a SeaORM connection pool.
///
/// Starts in auto-commit mode. With auto-commit disabled, a transaction is
/// begun the first time a statement runs or a savepoint is set, using the
/// session's isolation level and read-only flag, and is finished by
/// `commit` or `rollback`. Closing the session rolls back any open
/// transaction; the pool stays open.
pub struct SeaOrmConnection {
    db: Arc<DatabaseConnection>,
    state: Mutex<SessionState>,
    transaction: tokio::sync::Mutex<Option<DatabaseTransaction>>,
}

impl SeaOrmConnection {
    pub fn new(db: impl Into<Arc<DatabaseConnection>>) -> Self {
        let db = db.into();
        let isolation = match db.get_database_backend() {
            DbBackend::Postgres => TRANSACTION_READ_COMMITTED,
            DbBackend::MySql => TRANSACTION_REPEATABLE_READ,
            DbBackend::Sqlite => TRANSACTION_SERIALIZABLE,
        };
        Self {
            db,
            state: Mutex::new(SessionState {
                auto_commit: true,
                read_only: false,
                isolation,
                catalog: None,
                schema: None,
                holdability: Holdability::default(),
                closed: false,
                next_savepoint: 1,
            }),
            transaction: tokio::sync::Mutex::new(None),
        }
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Whether a transaction is currently open on this session.
    pub async fn in_transaction(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), DbErr> {
        if self.state().closed {
            return Err(DbErr::Custom("connection is closed".to_string()));
        }
        Ok(())
    }

    async fn begin_if_needed(&self, slot: &mut Option<DatabaseTransaction>) -> Result<(), DbErr> {
        if slot.is_some() {
            return Ok(());
        }
        let (auto_commit, isolation, read_only) = {
            let state = self.state();
            (state.auto_commit, state.isolation, state.read_only)
        };
        if auto_commit {
            return Ok(());
        }
        let access_mode = if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        let transaction = self
            .db
            .begin_with_config(isolation_level(isolation), Some(access_mode))
            .await?;
        tracing::trace!(isolation, read_only, "transaction begun");
        *slot = Some(transaction);
        Ok(())
    }

    async fn finish_transaction(&self, commit: bool) -> Result<(), DbErr> {
        let transaction = self.transaction.lock().await.take();
        match transaction {
            Some(transaction) if commit => {
                transaction.commit().await?;
                tracing::trace!("transaction committed");
            }
            Some(transaction) => {
                transaction.rollback().await?;
                tracing::trace!("transaction rolled back");
            }
            None => {}
        }
        Ok(())
    }

    /// Run session-level SQL on the open transaction, or on the pool.
    async fn run_on_session(&self, sql: &str) -> Result<(), DbErr> {
        let slot = self.transaction.lock().await;
        match slot.as_ref() {
            Some(transaction) => transaction.execute_unprepared(sql).await?,
            None => self.db.execute_unprepared(sql).await?,
        };
        Ok(())
    }

    /// Run savepoint SQL, which needs a transaction.
    async fn run_in_transaction(&self, sql: &str) -> Result<(), DbErr> {
        let mut slot = self.transaction.lock().await;
        self.begin_if_needed(&mut slot).await?;
        match slot.as_ref() {
            Some(transaction) => {
                transaction.execute_unprepared(sql).await?;
                Ok(())
            }
            None => Err(DbErr::Custom(
                "savepoints require auto-commit to be disabled".to_string(),
            )),
        }
    }

    fn savepoint_name(&self, savepoint: &Savepoint) -> String {
        quote_identifier(self.db.get_database_backend(), &savepoint.sql_name())
    }

    fn statement(&self, sql: Option<String>, cursor: Option<CursorOptions>) -> SeaOrmStatement {
        SeaOrmStatement {
            backend: self.db.get_database_backend(),
            sql,
            cursor,
        }
    }
}

impl std::fmt::Debug for SeaOrmConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaOrmConnection")
            .field("backend", &self.db.get_database_backend())
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SeaOrmConnection {
    type Statement = SeaOrmStatement;

    async fn create_statement(
        &self,
        options: Option<CursorOptions>,
    ) -> Result<Self::Statement, DbErr> {
        self.ensure_open()?;
        Ok(self.statement(None, options))
    }

    async fn prepare_statement(
        &self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<Self::Statement, DbErr> {
        self.ensure_open()?;
        let cursor = match options {
            PrepareOptions::Cursor(cursor) => Some(cursor),
            _ => None,
        };
        Ok(self.statement(Some(sql.to_string()), cursor))
    }

    async fn prepare_call(
        &self,
        sql: &str,
        options: Option<CursorOptions>,
    ) -> Result<Self::Statement, DbErr> {
        self.ensure_open()?;
        let sql = self.native_sql(sql).await?;
        Ok(self.statement(Some(sql), options))
    }

    /// Rewrite the `{call ...}` escape into the backend's call syntax.
    async fn native_sql(&self, sql: &str) -> Result<String, DbErr> {
        let trimmed = sql.trim();
        let Some(body) = trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            return Ok(sql.to_string());
        };
        let body = body.trim();
        let Some(call) = body.get(..4).filter(|kw| kw.eq_ignore_ascii_case("call")) else {
            return Ok(sql.to_string());
        };
        let rest = &body[call.len()..];
        if !rest.starts_with(char::is_whitespace) {
            return Ok(sql.to_string());
        }
        let target = rest.trim();
        Ok(match self.db.get_database_backend() {
            DbBackend::Sqlite => format!("SELECT {target}"),
            DbBackend::Postgres | DbBackend::MySql => format!("CALL {target}"),
        })
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbErr> {
        self.ensure_open()?;
        let previous = std::mem::replace(&mut self.state().auto_commit, auto_commit);
        if auto_commit && !previous {
            self.finish_transaction(true).await?;
        }
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbErr> {
        self.ensure_open()?;
        self.finish_transaction(true).await
    }

    async fn rollback(&self) -> Result<(), DbErr> {
        self.ensure_open()?;
        self.finish_transaction(false).await
    }

    async fn close(&self) -> Result<(), DbErr> {
        if self.state().closed {
            return Ok(());
        }
        let result = self.finish_transaction(false).await;
        self.state().closed = true;
        result
    }

    async fn set_read_only(&self, read_only: bool) -> Result<(), DbErr> {
        self.ensure_open()?;
        self.state().read_only = read_only;
        Ok(())
    }

    async fn set_catalog(&self, catalog: &str) -> Result<(), DbErr> {
        self.ensure_open()?;
        if self.db.get_database_backend() == DbBackend::MySql {
            let catalog = quote_identifier(DbBackend::MySql, catalog);
            self.run_on_session(&format!("USE {catalog}")).await?;
        }
        self.state().catalog = Some(catalog.to_string());
        Ok(())
    }

    async fn set_schema(&self, schema: &str) -> Result<(), DbErr> {
        self.ensure_open()?;
        if self.db.get_database_backend() == DbBackend::Postgres {
            let schema = quote_identifier(DbBackend::Postgres, schema);
            self.run_on_session(&format!("SET search_path TO {schema}")).await?;
        }
        self.state().schema = Some(schema.to_string());
        Ok(())
    }

    async fn set_transaction_isolation(&self, level: i32) -> Result<(), DbErr> {
        self.ensure_open()?;
        if isolation_level(level).is_none() {
            return Err(DbErr::Custom(format!(
                "unsupported transaction isolation level {level}"
            )));
        }
        self.state().isolation = level;
        Ok(())
    }

    async fn set_holdability(&self, holdability: Holdability) -> Result<(), DbErr> {
        self.ensure_open()?;
        self.state().holdability = holdability;
        Ok(())
    }

    async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint, DbErr> {
        self.ensure_open()?;
        let id = {
            let mut state = self.state();
            let id = state.next_savepoint;
            state.next_savepoint += 1;
            id
        };
        let savepoint = Savepoint {
            id,
            name: name.map(str::to_string),
        };
        self.run_in_transaction(&format!("SAVEPOINT {}", self.savepoint_name(&savepoint)))
            .await?;
        Ok(savepoint)
    }

    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<(), DbErr> {
        self.ensure_open()?;
        self.run_in_transaction(&format!("ROLLBACK TO SAVEPOINT {}", self.savepoint_name(savepoint)))
            .await
    }

    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<(), DbErr> {
        self.ensure_open()?;
        self.run_in_transaction(&format!("RELEASE SAVEPOINT {}", self.savepoint_name(savepoint)))
            .await
    }

    fn auto_commit(&self) -> bool {
        self.state().auto_commit
    }

    fn is_read_only(&self) -> bool {
        self.state().read_only
    }

    fn transaction_isolation(&self) -> Result<i32, DbErr> {
        let state = self.state();
        if state.closed {
            return Err(DbErr::Custom("connection is closed".to_string()));
        }
        Ok(state.isolation)
    }

    fn catalog(&self) -> Option<String> {
        self.state().catalog.clone()
    }

    fn schema(&self) -> Option<String> {
        self.state().schema.clone()
    }

    fn holdability(&self) -> Holdability {
        self.state().holdability
    }

    fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[async_trait]
impl ConnectionTrait for SeaOrmConnection {
    fn get_database_backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        self.ensure_open()?;
        let mut slot = self.transaction.lock().await;
        self.begin_if_needed(&mut slot).await?;
        match slot.as_ref() {
            Some(transaction) => transaction.execute(stmt).await,
            None => self.db.execute(stmt).await,
        }
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        self.ensure_open()?;
        let mut slot = self.transaction.lock().await;
        self.begin_if_needed(&mut slot).await?;
        match slot.as_ref() {
            Some(transaction) => transaction.execute_unprepared(sql).await,
            None => self.db.execute_unprepared(sql).await,
        }
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        self.ensure_open()?;
        let mut slot = self.transaction.lock().await;
        self.begin_if_needed(&mut slot).await?;
        match slot.as_ref() {
            Some(transaction) => transaction.query_one(stmt).await,
            None => self.db.query_one(stmt).await,
        }
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        self.ensure_open()?;
        let mut slot = self.transaction.lock().await;
        self.begin_if_needed(&mut slot).await?;
        match slot.as_ref() {
            Some(transaction) => transaction.query_all(stmt).await,
            None => self.db.query_all(stmt).await,
        }
    }

    fn support_returning(&self) -> bool {
        self.db.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.db.is_mock_connection()
    }
}
