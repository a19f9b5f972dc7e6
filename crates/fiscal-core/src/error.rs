//! # Error Types
//!
//! Domain-specific error types for fiscal-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fiscal-core errors (this file)                                        │
//! │  ├── CoreError        - Domain invariants, key and signing failures    │
//! │  └── ValidationError  - Structural input problems (named fields)       │
//! │                                                                         │
//! │  fiscal-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  fiscal-engine errors                                                  │
//! │  └── EngineError      - What callers see, with retry classification    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages never include key material. Key errors name the problem, and
//! the engine adds the device and path.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Fiscal domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Closing a fiscal day that has no receipts.
    ///
    /// ## When This Occurs
    /// - CloseDay requested right after OpenDay
    /// - All receipts were recorded under a different day number
    #[error("Fiscal day {fiscal_day_no} of device {device_id} has no receipts to close")]
    EmptyFiscalDay {
        device_id: String,
        fiscal_day_no: u32,
    },

    /// Invoice number already used by this device.
    #[error("Invoice {invoice_no} was already submitted by device {device_id}")]
    DuplicateInvoice {
        device_id: String,
        invoice_no: String,
    },

    /// Caller-supplied fiscal day number does not match the open day.
    ///
    /// ## User Workflow
    /// ```text
    /// POS: CloseDay(day=12)
    ///      │
    ///      ▼
    /// Stored open day = 13
    ///      │
    ///      ▼
    /// FiscalDayMismatch { expected: 13, provided: 12 }
    /// ```
    #[error("Fiscal day mismatch: open day is {expected}, request named {provided}")]
    FiscalDayMismatch { expected: u32, provided: u32 },

    #[error("Device {device_id} has no open fiscal day")]
    NoOpenFiscalDay { device_id: String },

    #[error("Device {device_id} already has fiscal day {fiscal_day_no} open")]
    FiscalDayAlreadyOpen {
        device_id: String,
        fiscal_day_no: u32,
    },

    /// Day numbers only move forward for a device.
    #[error("Device {device_id} cannot open fiscal day {provided}: latest recorded day is {latest}")]
    FiscalDayNotIncreasing {
        device_id: String,
        latest: u32,
        provided: u32,
    },

    #[error("Fiscal day {fiscal_day_no} not found for device {device_id}")]
    FiscalDayNotFound {
        device_id: String,
        fiscal_day_no: u32,
    },

    /// Monetary sign does not fit the receipt type
    /// (credit notes non-positive, sales and debit notes non-negative).
    #[error("{receipt_type} line {line_no} has a {found} amount")]
    InvalidReceiptSign {
        receipt_type: String,
        line_no: u32,
        found: &'static str,
    },

    #[error("Receipt total mismatch: computed {computed}, caller supplied {provided}")]
    ReceiptTotalMismatch { computed: Money, provided: Money },

    /// Private key could not be parsed. Fatal, not retried.
    #[error("Private key could not be loaded: {reason}")]
    KeyLoad { reason: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    /// Signature bytes could not be decoded for a derived artifact.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Stored receipts do not form a valid chain for a fiscal day.
    #[error("Receipt chain broken at counter {counter}: {reason}")]
    BrokenChain { counter: u32, reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for caller-correctable invariant violations
    /// (as opposed to device misconfiguration).
    pub fn is_domain_invariant(&self) -> bool {
        matches!(
            self,
            CoreError::EmptyFiscalDay { .. }
                | CoreError::DuplicateInvoice { .. }
                | CoreError::FiscalDayMismatch { .. }
                | CoreError::NoOpenFiscalDay { .. }
                | CoreError::FiscalDayAlreadyOpen { .. }
                | CoreError::FiscalDayNotIncreasing { .. }
                | CoreError::FiscalDayNotFound { .. }
                | CoreError::InvalidReceiptSign { .. }
                | CoreError::ReceiptTotalMismatch { .. }
                | CoreError::Validation(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation of caller drafts before numbering and signing.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., non-numeric amount, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================
