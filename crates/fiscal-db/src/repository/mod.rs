//! # Repository Module
//!
//! Database repositories for the fiscal gateway.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  fiscal-engine (FiscalStore impl)                                      │
//! │       │                                                                 │
//! │       │  db.receipts().list_for_day("321", 84)                         │
//! │       ▼                                                                 │
//! │  ReceiptRepository                                                     │
//! │  ├── insert(&self, receipt)        receipt + lines, one transaction    │
//! │  ├── list_for_day(&self, ..)       ordered by receipt counter          │
//! │  ├── last_for_device(&self, ..)    highest global number               │
//! │  └── exists(&self, ..)             invoice number lookup               │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`DeviceRepository`](device::DeviceRepository) - Registered devices
//! - [`FiscalDayRepository`](fiscal_day::FiscalDayRepository) - Open/close lifecycle
//! - [`ReceiptRepository`](receipt::ReceiptRepository) - Signed receipts and lines

pub mod device;
pub mod fiscal_day;
pub mod receipt;

use crate::error::{DbError, DbResult};

/// Narrows a stored INTEGER to the domain's unsigned width.
pub(crate) fn to_unsigned<T: TryFrom<i64>>(column: &str, value: i64) -> DbResult<T> {
    T::try_from(value).map_err(|_| DbError::corrupt(column, format!("{} out of range", value)))
}

/// Widens a domain number for binding. SQLite INTEGER is signed 64-bit.
pub(crate) fn to_stored(column: &str, value: u64) -> DbResult<i64> {
    i64::try_from(value).map_err(|_| DbError::corrupt(column, format!("{} out of range", value)))
}
