//! Profiled connection wrappers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, ExecResult, QueryResult, Value};

use crate::connection::{
    Connection, ConnectionSource, CursorOptions, Holdability, Lob, LobKind, PrepareOptions,
    Savepoint, SqlArray, SqlStruct,
};
use crate::event::{ConnectionEvent, ConnectionHandle, ConnectionId, Operation};
use crate::registry::ListenerRegistry;
use crate::sea::SeaOrmSource;

/// A profiled wrapper around any [`Connection`].
///
/// Every operation is reported to the listeners of the registry before it is
/// forwarded to the wrapped connection; the wrapped connection's result is
/// returned unchanged. Listener failures never affect the operation.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm_profiler::{ListenerRegistry, ProfiledConnection};
///
/// let profiled = ProfiledConnection::new(connection, ListenerRegistry::global());
///
/// // Reported to every registered listener, then committed
/// profiled.commit().await?;
/// ```
#[derive(Debug)]
pub struct ProfiledConnection<C> {
    inner: C,
    id: ConnectionId,
    registry: Arc<ListenerRegistry>,
}

impl<C: Connection> ProfiledConnection<C> {
    /// Wrap a connection, reporting to the given registry.
    pub fn new(connection: C, registry: Arc<ListenerRegistry>) -> Self {
        Self {
            inner: connection,
            id: ConnectionId::next(),
            registry,
        }
    }

    /// Wrap a connection, reporting to the process-wide registry.
    pub fn wrap(connection: C) -> Self {
        Self::new(connection, ListenerRegistry::global())
    }

    /// Get a reference to the underlying connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Consume the wrapper and return the underlying connection.
    pub fn into_inner(self) -> C {
        self.inner
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    fn notify(&self, operation: Operation<'_>) {
        self.registry.dispatch(&ConnectionEvent::new(self, operation));
    }
}

impl<C: Connection> ConnectionHandle for ProfiledConnection<C> {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn current_isolation(&self) -> Result<i32, DbErr> {
        self.inner.transaction_isolation()
    }
}

#[async_trait]
impl<C: Connection> Connection for ProfiledConnection<C> {
    type Statement = C::Statement;

    async fn create_statement(
        &self,
        options: Option<CursorOptions>,
    ) -> Result<Self::Statement, DbErr> {
        self.notify(Operation::CreateStatement(options));
        self.inner.create_statement(options).await
    }

    async fn prepare_statement(
        &self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<Self::Statement, DbErr> {
        self.notify(Operation::PrepareStatement {
            sql,
            options: &options,
        });
        self.inner.prepare_statement(sql, options).await
    }

    async fn prepare_call(
        &self,
        sql: &str,
        options: Option<CursorOptions>,
    ) -> Result<Self::Statement, DbErr> {
        self.notify(Operation::PrepareCall { sql, options });
        self.inner.prepare_call(sql, options).await
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbErr> {
        self.notify(Operation::SetAutoCommit(auto_commit));
        self.inner.set_auto_commit(auto_commit).await
    }

    async fn commit(&self) -> Result<(), DbErr> {
        self.notify(Operation::Commit);
        self.inner.commit().await
    }

    async fn rollback(&self) -> Result<(), DbErr> {
        self.notify(Operation::Rollback);
        self.inner.rollback().await
    }

    async fn close(&self) -> Result<(), DbErr> {
        self.notify(Operation::Close);
        self.inner.close().await
    }

    async fn set_read_only(&self, read_only: bool) -> Result<(), DbErr> {
        self.notify(Operation::SetReadOnly(read_only));
        self.inner.set_read_only(read_only).await
    }

    async fn set_catalog(&self, catalog: &str) -> Result<(), DbErr> {
        self.notify(Operation::SetCatalog(catalog));
        self.inner.set_catalog(catalog).await
    }

    async fn set_schema(&self, schema: &str) -> Result<(), DbErr> {
        self.notify(Operation::SetSchema(schema));
        self.inner.set_schema(schema).await
    }

    async fn set_transaction_isolation(&self, level: i32) -> Result<(), DbErr> {
        self.notify(Operation::SetTransactionIsolation(level));
        self.inner.set_transaction_isolation(level).await
    }

    async fn set_holdability(&self, holdability: Holdability) -> Result<(), DbErr> {
        self.notify(Operation::SetHoldability(holdability));
        self.inner.set_holdability(holdability).await
    }

    async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint, DbErr> {
        self.notify(Operation::SetSavepoint(name));
        self.inner.set_savepoint(name).await
    }

    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<(), DbErr> {
        self.notify(Operation::RollbackToSavepoint(savepoint));
        self.inner.rollback_to_savepoint(savepoint).await
    }

    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<(), DbErr> {
        self.notify(Operation::ReleaseSavepoint(savepoint));
        self.inner.release_savepoint(savepoint).await
    }

    async fn native_sql(&self, sql: &str) -> Result<String, DbErr> {
        self.notify(Operation::NativeSql(sql));
        self.inner.native_sql(sql).await
    }

    async fn clear_warnings(&self) -> Result<(), DbErr> {
        self.notify(Operation::ClearWarnings);
        self.inner.clear_warnings().await
    }

    async fn set_type_map(&self, map: &BTreeMap<String, String>) -> Result<(), DbErr> {
        self.notify(Operation::SetTypeMap(map));
        self.inner.set_type_map(map).await
    }

    async fn create_lob(&self, kind: LobKind) -> Result<Lob, DbErr> {
        self.notify(Operation::CreateLob(kind));
        self.inner.create_lob(kind).await
    }

    async fn create_array_of(&self, type_name: &str, elements: &[Value]) -> Result<SqlArray, DbErr> {
        self.notify(Operation::CreateArrayOf {
            type_name,
            elements,
        });
        self.inner.create_array_of(type_name, elements).await
    }

    async fn create_struct(&self, type_name: &str, attributes: &[Value]) -> Result<SqlStruct, DbErr> {
        self.notify(Operation::CreateStruct {
            type_name,
            attributes,
        });
        self.inner.create_struct(type_name, attributes).await
    }

    async fn set_client_info(&self, name: &str, value: &str) -> Result<(), DbErr> {
        self.notify(Operation::SetClientInfo { name, value });
        self.inner.set_client_info(name, value).await
    }

    async fn set_client_info_properties(
        &self,
        properties: &BTreeMap<String, String>,
    ) -> Result<(), DbErr> {
        self.notify(Operation::SetClientInfoProperties(properties));
        self.inner.set_client_info_properties(properties).await
    }

    async fn abort(&self) -> Result<(), DbErr> {
        self.notify(Operation::Abort);
        self.inner.abort().await
    }

    async fn set_network_timeout(&self, timeout: Duration) -> Result<(), DbErr> {
        self.notify(Operation::SetNetworkTimeout(timeout));
        self.inner.set_network_timeout(timeout).await
    }

    fn auto_commit(&self) -> bool {
        self.inner.auto_commit()
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    fn transaction_isolation(&self) -> Result<i32, DbErr> {
        self.inner.transaction_isolation()
    }

    fn catalog(&self) -> Option<String> {
        self.inner.catalog()
    }

    fn schema(&self) -> Option<String> {
        self.inner.schema()
    }

    fn holdability(&self) -> Holdability {
        self.inner.holdability()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

// Statements run through the session as-is; statement preparation is what
// gets reported.
#[async_trait]
impl<C> ConnectionTrait for ProfiledConnection<C>
where
    C: Connection + ConnectionTrait,
{
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: sea_orm::Statement) -> Result<ExecResult, DbErr> {
        self.inner.execute(stmt).await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        self.inner.execute_unprepared(sql).await
    }

    async fn query_one(&self, stmt: sea_orm::Statement) -> Result<Option<QueryResult>, DbErr> {
        self.inner.query_one(stmt).await
    }

    async fn query_all(&self, stmt: sea_orm::Statement) -> Result<Vec<QueryResult>, DbErr> {
        self.inner.query_all(stmt).await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

/// A profiled wrapper around a [`ConnectionSource`].
///
/// Connections it hands out are profiled too, and handing one out is
/// reported as "the datasource gets the connection".
#[derive(Debug)]
pub struct ProfiledSource<S> {
    inner: S,
    registry: Arc<ListenerRegistry>,
}

impl<S: ConnectionSource> ProfiledSource<S> {
    pub fn new(source: S, registry: Arc<ListenerRegistry>) -> Self {
        Self {
            inner: source,
            registry,
        }
    }

    pub fn wrap(source: S) -> Self {
        Self::new(source, ListenerRegistry::global())
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }
}

#[async_trait]
impl<S: ConnectionSource> ConnectionSource for ProfiledSource<S> {
    type Connection = ProfiledConnection<S::Connection>;

    async fn get_connection(&self) -> Result<Self::Connection, DbErr> {
        let connection = self.inner.get_connection().await?;
        let profiled = ProfiledConnection::new(connection, Arc::clone(&self.registry));
        profiled.notify(Operation::ConnectionAcquired);
        Ok(profiled)
    }
}

/// Extension trait for easy profiling of SeaORM connections.
pub trait ProfilingExt {
    /// Hand out profiled sessions on this connection, reporting to `registry`.
    fn with_profiling(self, registry: Arc<ListenerRegistry>) -> ProfiledSource<SeaOrmSource>;

    /// Hand out profiled sessions on this connection, reporting to the
    /// process-wide registry.
    fn with_global_profiling(self) -> ProfiledSource<SeaOrmSource>;
}

impl ProfilingExt for DatabaseConnection {
    fn with_profiling(self, registry: Arc<ListenerRegistry>) -> ProfiledSource<SeaOrmSource> {
        ProfiledSource::new(SeaOrmSource::new(self), registry)
    }

    fn with_global_profiling(self) -> ProfiledSource<SeaOrmSource> {
        ProfiledSource::wrap(SeaOrmSource::new(self))
    }
}
