//! # Validation Module
//!
//! Structural checks on caller input, run before a receipt is numbered or
//! signed. Every error names the offending field so the caller can correct
//! the request.
//!
//! ## Validation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Receipt Draft Validation                           │
//! │                                                                         │
//! │  POS submits draft                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_receipt_draft() ← THIS MODULE                                │
//! │       │                                                                 │
//! │       ├── invoiceNo empty / too long?       → Required / TooLong        │
//! │       ├── currency not configured?          → NotAllowed                │
//! │       ├── no lines / unnamed line?          → Required                  │
//! │       └── note without reference?           → Required                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Pricing (sign checks, totals) → numbering → signing                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{ValidationError, ValidationResult};
use crate::types::{ReceiptDraft, ReceiptType};

// =============================================================================
// Constants
// =============================================================================

pub const MAX_DEVICE_ID_LENGTH: usize = 64;

pub const MAX_INVOICE_NO_LENGTH: usize = 50;

pub const MAX_LINE_NAME_LENGTH: usize = 200;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a device id: non-empty, bounded length, ASCII letters, digits,
/// `-` and `_` only. The id names the device's key file, so path
/// separators and dots are never accepted.
pub fn validate_device_id(device_id: &str) -> ValidationResult<()> {
    if device_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "deviceId".to_string(),
        });
    }

    if device_id.len() > MAX_DEVICE_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: "deviceId".to_string(),
            max: MAX_DEVICE_ID_LENGTH,
        });
    }

    if !device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "deviceId".to_string(),
            reason: "only ASCII letters, digits, '-' and '_' are allowed".to_string(),
        });
    }

    Ok(())
}

pub fn validate_invoice_no(invoice_no: &str) -> ValidationResult<()> {
    if invoice_no.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "invoiceNo".to_string(),
        });
    }

    if invoice_no.len() > MAX_INVOICE_NO_LENGTH {
        return Err(ValidationError::TooLong {
            field: "invoiceNo".to_string(),
            max: MAX_INVOICE_NO_LENGTH,
        });
    }

    Ok(())
}

/// Validates a currency code against the configured whitelist.
///
/// ## Example
/// ```rust
/// use fiscal_core::validation::validate_currency;
///
/// let allowed = vec!["ZWG".to_string(), "USD".to_string()];
/// assert!(validate_currency("USD", &allowed).is_ok());
/// assert!(validate_currency("EUR", &allowed).is_err());
/// ```
pub fn validate_currency(currency: &str, allowed: &[String]) -> ValidationResult<()> {
    let code = currency.trim();
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if !code.chars().all(|c| c.is_ascii_uppercase()) || code.len() != 3 {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: format!("'{}' is not an upper-case ISO 4217 code", code),
        });
    }

    if !allowed.iter().any(|a| a == code) {
        return Err(ValidationError::NotAllowed {
            field: "currency".to_string(),
            allowed: allowed.to_vec(),
        });
    }

    Ok(())
}

// =============================================================================
// Draft Validators
// =============================================================================

/// Validates everything about a draft that does not need pricing.
pub fn validate_receipt_draft(
    draft: &ReceiptDraft,
    allowed_currencies: &[String],
) -> ValidationResult<()> {
    validate_invoice_no(&draft.invoice_no)?;
    validate_currency(&draft.currency, allowed_currencies)?;

    if draft.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    for (idx, line) in draft.lines.iter().enumerate() {
        if line.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: format!("lines[{}].name", idx),
            });
        }
        if line.name.len() > MAX_LINE_NAME_LENGTH {
            return Err(ValidationError::TooLong {
                field: format!("lines[{}].name", idx),
                max: MAX_LINE_NAME_LENGTH,
            });
        }
    }

    if draft.receipt_type != ReceiptType::Sale {
        match &draft.credit_debit_note {
            None => {
                return Err(ValidationError::Required {
                    field: "creditDebitNote".to_string(),
                })
            }
            Some(reference) if !reference.is_complete() => {
                return Err(ValidationError::InvalidFormat {
                    field: "creditDebitNote".to_string(),
                    reason: "needs receiptID, or deviceID with receiptGlobalNo and fiscalDayNo"
                        .to_string(),
                })
            }
            Some(_) => {}
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{CreditDebitRef, LineDraft, MoneyType, Quantity};
    use chrono::NaiveDate;

    fn allowed() -> Vec<String> {
        vec!["ZWG".to_string(), "USD".to_string()]
    }

    fn draft(receipt_type: ReceiptType) -> ReceiptDraft {
        ReceiptDraft {
            invoice_no: "INV-1".to_string(),
            receipt_type,
            currency: "USD".to_string(),
            money_type: MoneyType::Cash,
            receipt_date: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            lines: vec![LineDraft {
                name: "Bread".to_string(),
                hs_code: None,
                quantity: Quantity::from_units(1),
                unit_price: Money::from_cents(10000),
                line_total: Money::from_cents(10000),
                tax_code: Some("C".to_string()),
            }],
            receipt_total: None,
            credit_debit_note: None,
            notes: None,
        }
    }

    #[test]
    fn test_validate_device_id() {
        assert!(validate_device_id("D1").is_ok());
        assert!(validate_device_id("0000012345").is_ok());
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("D 1").is_err());
        assert!(validate_device_id(&"9".repeat(65)).is_err());
        assert!(validate_device_id("gw-01_b").is_ok());
    }

    #[test]
    fn test_device_id_rejects_path_forms() {
        for id in ["../victim", "/tmp/x/victim", "a/b", "a\\b", "..", "dev.1"] {
            assert!(
                matches!(
                    validate_device_id(id),
                    Err(ValidationError::InvalidFormat { .. })
                ),
                "{} accepted",
                id
            );
        }
    }

    #[test]
    fn test_validate_invoice_no() {
        assert!(validate_invoice_no("INV-0001").is_ok());
        assert!(validate_invoice_no("   ").is_err());
        assert!(validate_invoice_no(&"X".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("ZWG", &allowed()).is_ok());
        assert!(validate_currency("usd", &allowed()).is_err());
        assert!(validate_currency("EUR", &allowed()).is_err());
        assert!(validate_currency("", &allowed()).is_err());
    }

    #[test]
    fn test_sale_draft_is_valid() {
        assert!(validate_receipt_draft(&draft(ReceiptType::Sale), &allowed()).is_ok());
    }

    #[test]
    fn test_draft_without_lines_is_rejected() {
        let mut d = draft(ReceiptType::Sale);
        d.lines.clear();
        let err = validate_receipt_draft(&d, &allowed()).unwrap_err();
        assert_eq!(err.to_string(), "lines is required");
    }

    #[test]
    fn test_credit_note_requires_reference() {
        let mut d = draft(ReceiptType::CreditNote);
        let err = validate_receipt_draft(&d, &allowed()).unwrap_err();
        assert_eq!(err.to_string(), "creditDebitNote is required");

        d.credit_debit_note = Some(CreditDebitRef {
            receipt_id: Some(1001),
            device_id: None,
            receipt_global_no: None,
            fiscal_day_no: None,
        });
        assert!(validate_receipt_draft(&d, &allowed()).is_ok());
    }
}
