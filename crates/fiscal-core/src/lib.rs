//! # fiscal-core: Pure Fiscal Rules
//!
//! Everything the gateway must get byte-exact lives here as pure functions:
//! counter aggregation, the two canonical signing strings, the signature
//! and its derived codes, and receipt chain numbering.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Fiscal Gateway Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Route layer / POS callers (out of scope)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   fiscal-engine: config, key store, device locks, operations    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ fiscal-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌──────────┐ ┌─────┐ │   │
//! │  │   │   tax    │ │ counters │ │ canonical │ │signature │ │ qr  │ │   │
//! │  │   │ resolver │ │aggregator│ │  strings  │ │ RSA/MD5  │ │ url │ │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └──────────┘ └─────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        fiscal-db: SQLite fiscal days, receipts, lines           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Receipt, FiscalCounter, TaxBracket, ...)
//! - [`money`] - Integer-cent Money and decimal parsing
//! - [`tax`] - Environment-aware tax code resolution
//! - [`receipt`] - Draft pricing and tax summaries
//! - [`counters`] - Fiscal counter aggregation
//! - [`canonical`] - CloseDay and SubmitReceipt signing strings
//! - [`signature`] - RSA signing, document hash, verification code
//! - [`qr`] - QR verification URL
//! - [`chain`] - Receipt counter / global number / previous hash rules
//! - [`validation`] - Caller input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use fiscal_core::canonical::counter_segment;
//! use fiscal_core::tax::{Environment, TaxCodeResolver};
//! use fiscal_core::{FiscalCounter, FiscalCounterType, Money, TaxCode};
//!
//! let resolver = TaxCodeResolver::new(Environment::Test);
//! let standard = resolver.bracket(TaxCode::Standard);
//! let counter = FiscalCounter::by_tax(
//!     FiscalCounterType::SaleByTax,
//!     "USD",
//!     &standard,
//!     Money::from_cents(10000),
//! );
//!
//! assert_eq!(counter_segment(&[counter]), "SALEBYTAXUSD15.0010000");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod canonical;
pub mod chain;
pub mod counters;
pub mod error;
pub mod money;
pub mod qr;
pub mod receipt;
pub mod signature;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
