//! # Storage Errors
//!
//! What can go wrong between the gateway and its SQLite file.
//!
//! ```text
//! sqlx::Error ──► DbError ──► EngineError::Storage
//!                    │
//!                    └── UniqueViolation on receipts / fiscal_days is
//!                        rewritten by the engine's store into
//!                        DuplicateInvoice / FiscalDayAlreadyOpen
//! ```
//!
//! Constraint failures are reported by table and column so callers can
//! tell a reused invoice number from a reused global number without
//! matching on SQLite message text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The addressed receipt or fiscal day does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A row would repeat a key the schema declares unique.
    ///
    /// ## When This Occurs
    /// - `receipts(device_id, invoice_no)`: the POS resubmitted an invoice
    /// - `receipts(device_id, global_no)`: two writers numbered the same
    ///   receipt, which the device lock should make impossible
    /// - `fiscal_days(device_id)`: a second day opened while one is open
    /// - `fiscal_days(device_id, fiscal_day_no)`: a day number reused
    #[error("{table} already holds a row with the same {}", .columns.join(", "))]
    UniqueViolation { table: String, columns: Vec<String> },

    /// A receipt line pointed at a receipt that was never written.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The database file could not be opened.
    ///
    /// ## When This Occurs
    /// - The gateway data directory is missing or read-only
    /// - The pool was closed during shutdown while a request was in flight
    #[error("Cannot open gateway database: {0}")]
    ConnectionFailed(String),

    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value cannot be turned back into a domain type.
    #[error("Corrupt {column} in stored row: {reason}")]
    Corrupt { column: String, reason: String },

    /// SQLite kept the write lock past the busy timeout.
    ///
    /// ## When This Occurs
    /// - Many devices submitting at once against one file, with a writer
    ///   holding the lock longer than `DbConfig::busy_timeout`
    #[error("Gateway database is busy")]
    Busy,

    /// No connection became free within `DbConfig::acquire_timeout`.
    #[error("No database connection available")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn corrupt(column: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Corrupt {
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    /// True when this is a unique violation whose key includes `column`.
    pub fn is_unique_on(&self, column: &str) -> bool {
        match self {
            DbError::UniqueViolation { columns, .. } => columns.iter().any(|c| c == column),
            _ => false,
        }
    }

    /// Failures that may succeed when the request is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }
}

/// Splits SQLite's unique failure text into table and key columns.
///
/// `"UNIQUE constraint failed: receipts.device_id, receipts.invoice_no"`
/// becomes `("receipts", ["device_id", "invoice_no"])`. Index-named
/// failures (`"index 'idx'"`) keep the raw text as the only column.
fn parse_unique_failure(message: &str) -> (String, Vec<String>) {
    let detail = message
        .split_once("UNIQUE constraint failed: ")
        .map(|(_, rest)| rest.trim())
        .unwrap_or(message);

    let mut table = String::new();
    let mut columns = Vec::new();
    for part in detail.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('.') {
            Some((t, column)) => {
                table = t.to_string();
                columns.push(column.to_string());
            }
            None => columns.push(part.to_string()),
        }
    }
    (table, columns)
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if message.starts_with("UNIQUE constraint failed") {
                    let (table, columns) = parse_unique_failure(message);
                    DbError::UniqueViolation { table, columns }
                } else if message.starts_with("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: message.to_string(),
                    }
                } else if message.contains("database is locked") {
                    DbError::Busy
                } else {
                    DbError::QueryFailed(message.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::Busy.is_transient());
        assert!(DbError::PoolExhausted.is_transient());
        assert!(DbError::ConnectionFailed("gone".into()).is_transient());
        assert!(!DbError::not_found("Receipt", "x").is_transient());
        assert!(!DbError::corrupt("receipt_type", "REFUND").is_transient());
    }

    #[test]
    fn test_unique_failure_names_table_and_columns() {
        let (table, columns) =
            parse_unique_failure("UNIQUE constraint failed: receipts.device_id, receipts.invoice_no");
        assert_eq!(table, "receipts");
        assert_eq!(columns, vec!["device_id", "invoice_no"]);

        let err = DbError::UniqueViolation { table, columns };
        assert!(err.is_unique_on("invoice_no"));
        assert!(!err.is_unique_on("global_no"));
        assert_eq!(
            err.to_string(),
            "receipts already holds a row with the same device_id, invoice_no"
        );

        let (table, columns) = parse_unique_failure("UNIQUE constraint failed: fiscal_days.device_id");
        assert_eq!(table, "fiscal_days");
        assert_eq!(columns, vec!["device_id"]);

        let (table, columns) = parse_unique_failure("UNIQUE constraint failed: index 'idx_open_day'");
        assert!(table.is_empty());
        assert_eq!(columns, vec!["index 'idx_open_day'"]);
    }
}
