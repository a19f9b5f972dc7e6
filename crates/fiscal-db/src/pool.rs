//! # Gateway Database Handle
//!
//! One SQLite file holds every device's fiscal days and receipts.
//!
//! ```text
//! submit_receipt(dev A) ─┐
//! submit_receipt(dev B) ─┼─► SqlitePool (WAL) ─► gateway.db
//! fiscal-preview (read) ─┘
//! ```
//!
//! Receipts for one device are already serialized by the engine's device
//! lock, so contention here is only between devices. WAL lets status reads
//! run beside a writer; writers from different devices queue on SQLite's
//! file lock for up to `busy_timeout` before the call fails with
//! [`DbError::Busy`].

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::device::DeviceRepository;
use crate::repository::fiscal_day::FiscalDayRepository;
use crate::repository::receipt::ReceiptRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the gateway keeps its data and how hard it waits for it.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/fiscal/gateway.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Upper bound on concurrent statements, readers included. Default 5.
    pub max_connections: u32,

    /// How long a request waits for a free connection. Default 30s.
    pub acquire_timeout: Duration,

    /// How long a writer waits for another device's write to finish.
    /// Default 5s.
    pub busy_timeout: Duration,

    /// Apply pending schema migrations on open. Default true.
    pub run_migrations: bool,
}

impl DbConfig {
    /// The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A private in-memory database. A single connection, since every new
    /// `:memory:` connection would see an empty schema.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(":memory:")
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the gateway database. Cloning shares the pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./gateway.db")).await?;
/// let open_day = db.fiscal_days().get_open("321").await?;
/// let receipts = db.receipts().list_for_day("321", 84).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the gateway database and brings its
    /// schema up to date.
    ///
    /// Connections run in WAL mode with foreign keys on, so receipt lines
    /// are removed with their receipt.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening gateway database");

        let url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Gateway database pool ready"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Safe to call on an up-to-date file.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Gateway schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn devices(&self) -> DeviceRepository {
        DeviceRepository::new(self.pool.clone())
    }

    pub fn fiscal_days(&self) -> FiscalDayRepository {
        FiscalDayRepository::new(self.pool.clone())
    }

    pub fn receipts(&self) -> ReceiptRepository {
        ReceiptRepository::new(self.pool.clone())
    }

    /// Shuts the pool down. Later repository calls fail with
    /// `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing gateway database");
        self.pool.close().await;
    }

    /// True while a trivial statement still runs.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
