//! # fiscal-engine: Signing Service for the Fiscal Gateway
//!
//! Builds the documents a fiscal device signs and sends to the tax
//! authority: the CloseDay payload and the SubmitReceipt payload, plus the
//! running fiscal counters for status queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  route layer (HTTP, CLI, tests)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  fiscal-engine (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │  FiscalService ──► DeviceLocks ──► ReceiptChainTracker          │   │
//! │  │       │                                  │                      │   │
//! │  │       ├──► KeyStore (device RSA keys)    ▼                      │   │
//! │  │       │                            FiscalStore (trait)          │   │
//! │  │       └──► fiscal-core (counters, canonical strings, signing)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fiscal-db (SQLite)                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fiscal_db::{Database, DbConfig};
//! use fiscal_engine::{EngineConfig, FiscalService};
//!
//! let db = Database::new(DbConfig::new("gateway.db")).await?;
//! let config = EngineConfig::load(None)?;
//! let service = FiscalService::new(config, Arc::new(db));
//!
//! let signed = service.close_day("321", 84).await?;
//! let body = serde_json::to_string(&signed.request())?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod chain;
pub mod config;
pub mod error;
pub mod keystore;
pub mod locks;
pub mod payload;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use chain::ReceiptChainTracker;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use keystore::KeyStore;
pub use locks::{DeviceGuard, DeviceLocks};
pub use payload::{CloseDayRequest, CloseDaySigningPayload, SignedCloseDay, SubmitReceiptSigningPayload};
pub use service::{FiscalService, PendingReceipt};
pub use store::FiscalStore;
