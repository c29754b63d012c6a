//! The connection surface that gets profiled.
//!
//! [`Connection`] mirrors a JDBC-style session: transaction control, session
//! settings, statement preparation and savepoints. Any driver implementing it
//! can be wrapped by [`ProfiledConnection`](crate::ProfiledConnection).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{DbErr, Value};

/// Cursor type of the result sets a statement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultSetType {
    #[default]
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

impl fmt::Display for ResultSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ForwardOnly => "forward_only",
            Self::ScrollInsensitive => "scroll_insensitive",
            Self::ScrollSensitive => "scroll_sensitive",
        })
    }
}

/// Whether result sets can be updated through the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    #[default]
    ReadOnly,
    Updatable,
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "concur_read_only",
            Self::Updatable => "concur_updatable",
        })
    }
}

/// Whether open cursors survive a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Holdability {
    #[default]
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

impl fmt::Display for Holdability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HoldCursorsOverCommit => "hold_cursors_over_commit",
            Self::CloseCursorsAtCommit => "close_cursors_at_commit",
        })
    }
}

/// Cursor options for created or prepared statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorOptions {
    pub result_set_type: ResultSetType,
    pub concurrency: Concurrency,
    pub holdability: Option<Holdability>,
}

impl CursorOptions {
    pub fn new(result_set_type: ResultSetType, concurrency: Concurrency) -> Self {
        Self {
            result_set_type,
            concurrency,
            holdability: None,
        }
    }

    pub fn with_holdability(mut self, holdability: Holdability) -> Self {
        self.holdability = Some(holdability);
        self
    }
}

impl fmt::Display for CursorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (resultSetType), {} (resultSetConcurrency)",
            self.result_set_type, self.concurrency
        )?;
        if let Some(holdability) = self.holdability {
            write!(f, ", {holdability} (resultSetHoldability)")?;
        }
        Ok(())
    }
}

/// Whether generated keys are made available after an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKeys {
    Return,
    NoReturn,
}

impl fmt::Display for GeneratedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Return => "return_generated_keys",
            Self::NoReturn => "no_generated_keys",
        })
    }
}

/// The variants of statement preparation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrepareOptions {
    #[default]
    Plain,
    Cursor(CursorOptions),
    GeneratedKeys(GeneratedKeys),
    ColumnIndexes(Vec<usize>),
    ColumnNames(Vec<String>),
}

/// A savepoint inside the current transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    pub id: u32,
    pub name: Option<String>,
}

impl Savepoint {
    /// Name used in SQL: the given name, or one derived from the id.
    pub fn sql_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("sp_{}", self.id),
        }
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "savepoint {name}"),
            None => write!(f, "savepoint {}", self.id),
        }
    }
}

/// Large object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobKind {
    Blob,
    Clob,
    NClob,
    SqlXml,
}

impl fmt::Display for LobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Blob => "BLOB",
            Self::Clob => "CLOB",
            Self::NClob => "N CLOB",
            Self::SqlXml => "SQL XML",
        })
    }
}

/// An empty large object, filled by the caller before it is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lob {
    pub kind: LobKind,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlArray {
    pub type_name: String,
    pub elements: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStruct {
    pub type_name: String,
    pub attributes: Vec<Value>,
}

/// A JDBC-style database session.
///
/// Operations that touch the database are async and report SeaORM's
/// [`DbErr`]. State queries are synchronous and read the session's local view.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Statements created or prepared by this connection.
    type Statement: Send;

    async fn create_statement(
        &self,
        options: Option<CursorOptions>,
    ) -> Result<Self::Statement, DbErr>;

    async fn prepare_statement(
        &self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<Self::Statement, DbErr>;

    async fn prepare_call(
        &self,
        sql: &str,
        options: Option<CursorOptions>,
    ) -> Result<Self::Statement, DbErr>;

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbErr>;

    async fn commit(&self) -> Result<(), DbErr>;

    async fn rollback(&self) -> Result<(), DbErr>;

    async fn close(&self) -> Result<(), DbErr>;

    async fn set_read_only(&self, read_only: bool) -> Result<(), DbErr>;

    async fn set_catalog(&self, catalog: &str) -> Result<(), DbErr>;

    async fn set_schema(&self, schema: &str) -> Result<(), DbErr>;

    async fn set_transaction_isolation(&self, level: i32) -> Result<(), DbErr>;

    async fn set_holdability(&self, holdability: Holdability) -> Result<(), DbErr>;

    async fn set_savepoint(&self, name: Option<&str>) -> Result<Savepoint, DbErr>;

    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<(), DbErr>;

    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<(), DbErr>;

    /// Translate SQL into the driver's native grammar. Drivers without a
    /// translation step return it unchanged.
    async fn native_sql(&self, sql: &str) -> Result<String, DbErr> {
        Ok(sql.to_string())
    }

    async fn clear_warnings(&self) -> Result<(), DbErr> {
        Ok(())
    }

    async fn set_type_map(&self, _map: &BTreeMap<String, String>) -> Result<(), DbErr> {
        Ok(())
    }

    async fn create_lob(&self, kind: LobKind) -> Result<Lob, DbErr> {
        Ok(Lob {
            kind,
            data: Vec::new(),
        })
    }

    async fn create_array_of(&self, type_name: &str, elements: &[Value]) -> Result<SqlArray, DbErr> {
        Ok(SqlArray {
            type_name: type_name.to_string(),
            elements: elements.to_vec(),
        })
    }

    async fn create_struct(&self, type_name: &str, attributes: &[Value]) -> Result<SqlStruct, DbErr> {
        Ok(SqlStruct {
            type_name: type_name.to_string(),
            attributes: attributes.to_vec(),
        })
    }

    async fn set_client_info(&self, _name: &str, _value: &str) -> Result<(), DbErr> {
        Ok(())
    }

    async fn set_client_info_properties(
        &self,
        _properties: &BTreeMap<String, String>,
    ) -> Result<(), DbErr> {
        Ok(())
    }

    /// Terminate the session without waiting for in-flight work.
    async fn abort(&self) -> Result<(), DbErr> {
        self.close().await
    }

    async fn set_network_timeout(&self, _timeout: Duration) -> Result<(), DbErr> {
        Ok(())
    }

    fn auto_commit(&self) -> bool;

    fn is_read_only(&self) -> bool;

    /// Current isolation code, see [`crate::isolation`].
    fn transaction_isolation(&self) -> Result<i32, DbErr>;

    fn catalog(&self) -> Option<String>;

    fn schema(&self) -> Option<String>;

    fn holdability(&self) -> Holdability;

    fn is_closed(&self) -> bool;
}

/// Hands out connections, like a pool or a data source.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    type Connection: Connection;

    async fn get_connection(&self) -> Result<Self::Connection, DbErr>;
}
