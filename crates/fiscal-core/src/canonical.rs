//! # Canonical Signing Strings
//!
//! Builds the exact byte strings the authority verifies signatures against.
//! Fields are concatenated with NO separators; adjacency is the delimiter,
//! so field order and number formats are load-bearing.
//!
//! ## CloseDay
//! ```text
//! deviceId │ fiscalDayNo │ YYYY-MM-DD │ counter segment
//! ─────────┼─────────────┼────────────┼──────────────────────────────────────
//! 321      │ 84          │ 2024-03-01 │ SALEBYTAXUSD15.0010000
//!          │             │            │ SALETAXBYTAXUSD15.001500
//!          │             │            │ BALANCEBYMONEYTYPEUSDCASH11500
//!
//! counter    = TYPE CURRENCY [PERCENT] CENTS        (percent absent for exempt)
//! balance    = TYPE CURRENCY MONEYTYPE CENTS
//! zero values dropped; sorted by tax id (balance last), type, currency
//! ```
//!
//! ## SubmitReceipt
//! ```text
//! deviceId │ TYPE │ CURRENCY │ globalNo │ YYYY-MM-DDTHH:MM:SS │ totalCents
//!   + per tax entry (standard → zero → exempt → withholding):
//!        CODE [PERCENT] taxAmountCents salesAmountWithTaxCents
//!   + previous receipt hash, verbatim, unless first receipt of the day
//! ```
//!
//! Amounts are integer cents end to end, so no float formatting artifacts
//! can leak into a string. Negative amounts keep their sign.

use chrono::{NaiveDate, NaiveDateTime};

use crate::counters::compare_counters;
use crate::money::Money;
use crate::types::{FiscalCounter, ReceiptType, TaxSummaryEntry};

// =============================================================================
// Inputs
// =============================================================================

/// Everything the CloseDay protocol signs.
#[derive(Debug, Clone, Copy)]
pub struct CloseDayFields<'a> {
    pub device_id: &'a str,
    pub fiscal_day_no: u32,
    /// Opening date of the fiscal day.
    pub fiscal_day_date: NaiveDate,
    pub counters: &'a [FiscalCounter],
}

/// Everything the SubmitReceipt protocol signs.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptFields<'a> {
    pub device_id: &'a str,
    pub receipt_type: ReceiptType,
    pub currency: &'a str,
    pub global_no: u64,
    pub receipt_date: NaiveDateTime,
    pub total: Money,
    pub taxes: &'a [TaxSummaryEntry],
    /// Hash of the preceding receipt in the same fiscal day, if any.
    pub previous_hash: Option<&'a str>,
}

/// A document to sign, with its protocol chosen by the variant.
#[derive(Debug, Clone, Copy)]
pub enum CanonicalDocument<'a> {
    CloseDay(CloseDayFields<'a>),
    SubmitReceipt(ReceiptFields<'a>),
}

impl CanonicalDocument<'_> {
    pub fn canonical_string(&self) -> String {
        match self {
            CanonicalDocument::CloseDay(fields) => close_day_string(fields),
            CanonicalDocument::SubmitReceipt(fields) => receipt_string(fields),
        }
    }
}

// =============================================================================
// CloseDay
// =============================================================================

pub fn close_day_string(fields: &CloseDayFields<'_>) -> String {
    let mut out = format!(
        "{}{}{}",
        fields.device_id,
        fields.fiscal_day_no,
        fields.fiscal_day_date.format("%Y-%m-%d")
    );
    out.push_str(&counter_segment(fields.counters));
    out.to_uppercase()
}

/// The counter part of a CloseDay string. Input order does not matter.
pub fn counter_segment(counters: &[FiscalCounter]) -> String {
    let mut kept: Vec<&FiscalCounter> = counters.iter().filter(|c| !c.value.is_zero()).collect();
    kept.sort_by(|a, b| compare_counters(a, b));

    let mut out = String::new();
    for counter in kept {
        out.push_str(counter.counter_type.name());
        out.push_str(&counter.currency);
        match counter.money_type {
            Some(money_type) if counter.is_balance() => out.push_str(money_type.authority_name()),
            _ => {
                if let Some(percent) = counter.tax_percent {
                    out.push_str(&percent.percent_string());
                }
            }
        }
        out.push_str(&counter.value.cents().to_string());
    }
    out.to_uppercase()
}

// =============================================================================
// SubmitReceipt
// =============================================================================

pub fn receipt_string(fields: &ReceiptFields<'_>) -> String {
    let first_part = format!(
        "{}{}{}{}{}{}",
        fields.device_id,
        fields.receipt_type.authority_name(),
        fields.currency,
        fields.global_no,
        fields.receipt_date.format("%Y-%m-%dT%H:%M:%S"),
        fields.total.cents()
    )
    .to_uppercase();

    let mut out = first_part;
    out.push_str(&receipt_tax_part(fields.taxes));
    if let Some(previous) = fields.previous_hash {
        out.push_str(previous);
    }
    out
}

/// The tax part of a SubmitReceipt string, in receipt order.
pub fn receipt_tax_part(taxes: &[TaxSummaryEntry]) -> String {
    let mut ordered: Vec<&TaxSummaryEntry> = taxes.iter().collect();
    ordered.sort_by_key(|entry| entry.tax_code.receipt_position());

    let mut out = String::new();
    for entry in ordered {
        out.push_str(entry.tax_code.letter());
        if let Some(percent) = entry.tax_percent {
            out.push_str(&percent.percent_string());
        }
        out.push_str(&entry.tax_amount.cents().to_string());
        out.push_str(&entry.sales_amount_with_tax.cents().to_string());
    }
    out.to_uppercase()
}

// =============================================================================
// Unit Tests
// =============================================================================
