//! Events describing intercepted connection operations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sea_orm::{DbErr, Value};

use crate::connection::{CursorOptions, Holdability, LobKind, PrepareOptions, Savepoint};
use crate::isolation::isolation_label;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to a connection when it is wrapped.
///
/// Unique within the process; stable for the lifetime of the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The connection an event was raised on, as seen by listeners.
pub trait ConnectionHandle: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Current isolation code of the underlying connection.
    fn current_isolation(&self) -> Result<i32, DbErr>;
}

/// One intercepted operation and its arguments.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    ConnectionAcquired,
    CreateStatement(Option<CursorOptions>),
    PrepareStatement {
        sql: &'a str,
        options: &'a PrepareOptions,
    },
    PrepareCall {
        sql: &'a str,
        options: Option<CursorOptions>,
    },
    NativeSql(&'a str),
    SetAutoCommit(bool),
    Commit,
    Rollback,
    Close,
    SetReadOnly(bool),
    SetCatalog(&'a str),
    SetSchema(&'a str),
    SetTransactionIsolation(i32),
    SetHoldability(Holdability),
    ClearWarnings,
    SetTypeMap(&'a BTreeMap<String, String>),
    SetSavepoint(Option<&'a str>),
    RollbackToSavepoint(&'a Savepoint),
    ReleaseSavepoint(&'a Savepoint),
    CreateLob(LobKind),
    CreateArrayOf {
        type_name: &'a str,
        elements: &'a [Value],
    },
    CreateStruct {
        type_name: &'a str,
        attributes: &'a [Value],
    },
    SetClientInfo {
        name: &'a str,
        value: &'a str,
    },
    SetClientInfoProperties(&'a BTreeMap<String, String>),
    Abort,
    SetNetworkTimeout(Duration),
}

impl Operation<'_> {
    /// Short name, used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionAcquired => "get_connection",
            Self::CreateStatement(_) => "create_statement",
            Self::PrepareStatement { .. } => "prepare_statement",
            Self::PrepareCall { .. } => "prepare_call",
            Self::NativeSql(_) => "native_sql",
            Self::SetAutoCommit(_) => "set_auto_commit",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Close => "close",
            Self::SetReadOnly(_) => "set_read_only",
            Self::SetCatalog(_) => "set_catalog",
            Self::SetSchema(_) => "set_schema",
            Self::SetTransactionIsolation(_) => "set_transaction_isolation",
            Self::SetHoldability(_) => "set_holdability",
            Self::ClearWarnings => "clear_warnings",
            Self::SetTypeMap(_) => "set_type_map",
            Self::SetSavepoint(_) => "set_savepoint",
            Self::RollbackToSavepoint(_) => "rollback_to_savepoint",
            Self::ReleaseSavepoint(_) => "release_savepoint",
            Self::CreateLob(_) => "create_lob",
            Self::CreateArrayOf { .. } => "create_array_of",
            Self::CreateStruct { .. } => "create_struct",
            Self::SetClientInfo { .. } => "set_client_info",
            Self::SetClientInfoProperties(_) => "set_client_info_properties",
            Self::Abort => "abort",
            Self::SetNetworkTimeout(_) => "set_network_timeout",
        }
    }

    /// Whether the operation is only reported at [`Level::Trace`](crate::Level::Trace).
    pub fn is_detailed(&self) -> bool {
        matches!(
            self,
            Self::CreateStatement(_)
                | Self::PrepareStatement { .. }
                | Self::PrepareCall { .. }
                | Self::NativeSql(_)
                | Self::ClearWarnings
                | Self::CreateLob(_)
                | Self::SetTypeMap(_)
                | Self::SetHoldability(_)
                | Self::CreateArrayOf { .. }
                | Self::CreateStruct { .. }
        )
    }
}

/// An operation raised on a connection, delivered to every registered listener.
#[derive(Clone, Copy)]
pub struct ConnectionEvent<'a> {
    pub handle: &'a dyn ConnectionHandle,
    pub operation: Operation<'a>,
}

impl<'a> ConnectionEvent<'a> {
    pub fn new(handle: &'a dyn ConnectionHandle, operation: Operation<'a>) -> Self {
        Self { handle, operation }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// Label identifying the connection in profiling output.
    pub fn header(&self) -> String {
        format!("connection {}", self.handle.id())
    }

    /// Human-readable description of the operation.
    ///
    /// Auxiliary lookups on the connection that fail degrade to an empty label.
    pub fn description(&self) -> String {
        match self.operation {
            Operation::ConnectionAcquired => "the datasource gets the connection".to_string(),
            Operation::CreateStatement(None) => "create statement".to_string(),
            Operation::CreateStatement(Some(options)) => format!("create statement with {options}"),
            Operation::PrepareStatement { sql, options } => match options {
                PrepareOptions::Plain => format!("prepare statement with {sql} (SQL)"),
                PrepareOptions::Cursor(cursor) => {
                    format!("prepare statement with {sql} (SQL), {cursor}")
                }
                PrepareOptions::GeneratedKeys(keys) => {
                    format!("prepare statement with {sql} (SQL), {keys} (autoGeneratedKeys)")
                }
                PrepareOptions::ColumnIndexes(indexes) => {
                    format!("prepare statement with {sql} (SQL), {indexes:?} (columnIndexes)")
                }
                PrepareOptions::ColumnNames(names) => {
                    format!("prepare statement with {sql} (SQL), {names:?} (columnNames)")
                }
            },
            Operation::PrepareCall { sql, options: None } => {
                format!("prepare callable statement with {sql} (SQL)")
            }
            Operation::PrepareCall {
                sql,
                options: Some(cursor),
            } => format!("prepare callable statement with {sql} (SQL), {cursor}"),
            Operation::NativeSql(sql) => format!("native SQL {sql}"),
            Operation::SetAutoCommit(auto_commit) => format!("auto commit set to {auto_commit}"),
            Operation::Commit => format!("commit with {} isolation", self.current_isolation_label()),
            Operation::Rollback => "rollback".to_string(),
            Operation::Close => "closed".to_string(),
            Operation::SetReadOnly(read_only) => format!("read only set to {read_only}"),
            Operation::SetCatalog(catalog) => format!("set catalog: {catalog}"),
            Operation::SetSchema(schema) => format!("set schema to {schema}"),
            Operation::SetTransactionIsolation(level) => format!(
                "set transaction isolation to {level} ({})",
                self.current_isolation_label()
            ),
            Operation::SetHoldability(holdability) => format!("holdability set to {holdability}"),
            Operation::ClearWarnings => "clear warnings".to_string(),
            Operation::SetTypeMap(map) => format!("type map set to {map:?}"),
            Operation::SetSavepoint(None) => "set save point".to_string(),
            Operation::SetSavepoint(Some(name)) => format!("set save point with {name} (name)"),
            Operation::RollbackToSavepoint(savepoint) => {
                format!("set rollback with {savepoint} (save point)")
            }
            Operation::ReleaseSavepoint(savepoint) => format!("release {savepoint} (save point)"),
            Operation::CreateLob(kind) => format!("create {kind}"),
            Operation::CreateArrayOf {
                type_name,
                elements,
            } => format!("create array of with {type_name} (type name) and {elements:?} (elements)"),
            Operation::CreateStruct {
                type_name,
                attributes,
            } => format!(
                "create struct with {type_name} (type name) and {attributes:?} (attributes)"
            ),
            Operation::SetClientInfo { name, value } => {
                format!("set client info to {name} (name) and {value} (value)")
            }
            Operation::SetClientInfoProperties(properties) => {
                format!("set client info to {properties:?} (properties)")
            }
            Operation::Abort => "abort".to_string(),
            Operation::SetNetworkTimeout(timeout) => format!(
                "set network timeout to {} (milliseconds)",
                timeout.as_millis()
            ),
        }
    }

    fn current_isolation_label(&self) -> &'static str {
        match self.handle.current_isolation() {
            Ok(code) => isolation_label(code),
            Err(err) => {
                tracing::debug!(error = %err, "could not read transaction isolation");
                ""
            }
        }
    }
}

impl fmt::Display for ConnectionEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.header(), self.description())
    }
}

impl fmt::Debug for ConnectionEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEvent")
            .field("connection", &self.handle.id())
            .field("operation", &self.operation)
            .finish()
    }
}
