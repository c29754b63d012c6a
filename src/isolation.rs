//! Transaction isolation codes and their display labels.

use sea_orm::IsolationLevel;

pub const TRANSACTION_NONE: i32 = 0;
pub const TRANSACTION_READ_UNCOMMITTED: i32 = 1;
pub const TRANSACTION_READ_COMMITTED: i32 = 2;
pub const TRANSACTION_REPEATABLE_READ: i32 = 4;
pub const TRANSACTION_SERIALIZABLE: i32 = 8;

/// Decode an isolation code into the label used in profiling output.
///
/// Unknown codes decode to an empty label.
pub fn isolation_label(code: i32) -> &'static str {
    match code {
        TRANSACTION_NONE => "transaction_none",
        TRANSACTION_READ_UNCOMMITTED => "transaction_read_uncommitted",
        TRANSACTION_READ_COMMITTED => "transaction_read_committed",
        TRANSACTION_REPEATABLE_READ => "transaction_repeatable_read",
        TRANSACTION_SERIALIZABLE => "transaction_serializable",
        _ => "",
    }
}

/// Isolation code of a SeaORM isolation level.
pub fn isolation_code(level: IsolationLevel) -> i32 {
    match level {
        IsolationLevel::ReadUncommitted => TRANSACTION_READ_UNCOMMITTED,
        IsolationLevel::ReadCommitted => TRANSACTION_READ_COMMITTED,
        IsolationLevel::RepeatableRead => TRANSACTION_REPEATABLE_READ,
        IsolationLevel::Serializable => TRANSACTION_SERIALIZABLE,
    }
}

/// SeaORM isolation level for a code, if SeaORM can express it.
pub fn isolation_level(code: i32) -> Option<IsolationLevel> {
    match code {
        TRANSACTION_READ_UNCOMMITTED => Some(IsolationLevel::ReadUncommitted),
        TRANSACTION_READ_COMMITTED => Some(IsolationLevel::ReadCommitted),
        TRANSACTION_REPEATABLE_READ => Some(IsolationLevel::RepeatableRead),
        TRANSACTION_SERIALIZABLE => Some(IsolationLevel::Serializable),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(isolation_label(0), "transaction_none");
        assert_eq!(isolation_label(1), "transaction_read_uncommitted");
        assert_eq!(isolation_label(2), "transaction_read_committed");
        assert_eq!(isolation_label(8), "transaction_serializable");
    }

    #[test]
    fn test_unknown_code_is_empty() {
        assert_eq!(isolation_label(99), "");
        assert_eq!(isolation_label(-1), "");
    }

    #[test]
    fn test_sea_orm_levels() {
        assert_eq!(isolation_code(IsolationLevel::ReadCommitted), 2);
        assert!(matches!(
            isolation_level(TRANSACTION_SERIALIZABLE),
            Some(IsolationLevel::Serializable)
        ));
        assert!(isolation_level(TRANSACTION_NONE).is_none());
    }
}
