//! # fiscal-db: Database Layer for the Fiscal Gateway
//!
//! Local SQLite storage for fiscal days and signed receipts, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Fiscal Gateway Data Flow                         │
//! │                                                                         │
//! │  fiscal-engine (close_day / submit_receipt)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     fiscal-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ DeviceRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ FiscalDayRepo  │    │ 001_init.sql │  │   │
//! │  │   │ WAL, FKs on   │    │ ReceiptRepo    │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Device, fiscal day and receipt repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fiscal_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/gateway.db")).await?;
//! let day = db.fiscal_days().get_open("321").await?;
//! let receipts = db.receipts().list_for_day("321", 84).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::device::{Device, DeviceRepository};
pub use repository::fiscal_day::FiscalDayRepository;
pub use repository::receipt::ReceiptRepository;
