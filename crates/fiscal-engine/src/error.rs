//! # Engine Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Domain      │  │       Storage           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Config         │  │  Core(..)       │  │  Storage(DbError)       │ │
//! │  │  ConfigLoad     │  │   EmptyFiscalDay│  │   retryable only when   │ │
//! │  │  ConfigSave     │  │   Duplicate...  │  │   the pool is busy or   │ │
//! │  │  KeyStore       │  │   DayMismatch   │  │   the connection died   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Configuration and domain errors are never retried.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use thiserror::Error;

use fiscal_core::{CoreError, ValidationError};
use fiscal_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid engine configuration: {0}")]
    Config(String),

    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    #[error("Failed to save config: {0}")]
    ConfigSave(String),

    /// The device's key file is missing, unreadable or not a usable key.
    /// Never carries key bytes.
    #[error("Signing key for device {device_id} unavailable at {}: {reason}", path.display())]
    KeyStore {
        device_id: String,
        path: PathBuf,
        reason: String,
    },
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoad(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSave(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Returns true if the operation can be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Storage(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error means the device or gateway is misconfigured.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::Config(_)
                | EngineError::ConfigLoad(_)
                | EngineError::ConfigSave(_)
                | EngineError::KeyStore { .. }
                | EngineError::Core(CoreError::KeyLoad { .. })
        )
    }

    /// Returns true for errors the caller can fix by correcting the request.
    pub fn is_domain_error(&self) -> bool {
        match self {
            EngineError::Core(err) => err.is_domain_invariant(),
            _ => false,
        }
    }
}
