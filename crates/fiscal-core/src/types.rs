//! # Domain Types
//!
//! Core types shared by aggregation, string building and storage.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Fiscal Domain Types                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxBracket   │   │     Receipt     │   │    FiscalDay    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code  (A..D)   │◄──│  lines[]        │──►│  device_id      │       │
//! │  │  percent?       │   │  taxes[]        │   │  day_no         │       │
//! │  │  tax_id         │   │  counter        │   │  opened_at      │       │
//! │  └─────────────────┘   │  global_no      │   │  status         │       │
//! │                        │  signature      │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                 │ aggregated into                       │
//! │                                 ▼                                       │
//! │                        ┌─────────────────┐                              │
//! │                        │  FiscalCounter  │  pure view, never stored     │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::ValidationError;
use crate::money::{format_scaled, parse_scaled, Money, ScaledVisitor};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (1500 = 15.00%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses a percentage ("15", "15.00", "14.5") into basis points.
    pub fn parse_percent(input: &str) -> Result<TaxRate, ValidationError> {
        parse_scaled(input, 2)
            .and_then(|bps| u32::try_from(bps).ok())
            .map(TaxRate)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "tax percent".to_string(),
                reason: format!("'{}' is not a non-negative percentage", input.trim()),
            })
    }

    /// Fixed two-decimal form used in signing strings: 1500 → "15.00".
    pub fn percent_string(&self) -> String {
        format_scaled(i64::from(self.0), 2)
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.percent_string())
    }
}

/// JSON carries percentages as numbers (15.0).
impl Serialize for TaxRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(f64::from(self.0) / 100.0)
    }
}

impl<'de> Deserialize<'de> for TaxRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bps = deserializer.deserialize_any(ScaledVisitor {
            scale: 2,
            what: "tax percent",
        })?;
        u32::try_from(bps)
            .map(TaxRate)
            .map_err(|_| serde::de::Error::custom("tax percent must not be negative"))
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Line quantity in thousandths (1.5 units = 1500).
///
/// Informational only: `LineItem.line_total` is authoritative and is never
/// recomputed from quantity × price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(i64);

impl Quantity {
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * 1000)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::from_units(1)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_scaled(self.0, 3))
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 1000.0)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(ScaledVisitor {
                scale: 3,
                what: "quantity",
            })
            .map(Quantity)
    }
}

// =============================================================================
// Tax Codes & Brackets
// =============================================================================

/// Symbolic tax code.
///
/// ```text
/// Letter  Meaning                 Percent   Aliases
/// ──────  ──────────────────────  ────────  ─────────────────
///   A     Exempt                  (none)    exempt, -1
///   B     Zero-rated              0.00      zero, 0
///   C     Standard VAT            15.00     standard, 15
///   D     Non-VAT withholding     5.00      withholding, 5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaxCode {
    Exempt,
    Zero,
    Standard,
    Withholding,
}

impl TaxCode {
    /// Order of tax entries in the SubmitReceipt tax part.
    pub const RECEIPT_ORDER: [TaxCode; 4] = [
        TaxCode::Standard,
        TaxCode::Zero,
        TaxCode::Exempt,
        TaxCode::Withholding,
    ];

    /// The single-letter code the authority uses on receipts.
    pub fn letter(&self) -> &'static str {
        match self {
            TaxCode::Exempt => "A",
            TaxCode::Zero => "B",
            TaxCode::Standard => "C",
            TaxCode::Withholding => "D",
        }
    }

    pub fn receipt_position(&self) -> usize {
        match self {
            TaxCode::Standard => 0,
            TaxCode::Zero => 1,
            TaxCode::Exempt => 2,
            TaxCode::Withholding => 3,
        }
    }
}

impl fmt::Display for TaxCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl FromStr for TaxCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" | "exempt" | "-1" => Ok(TaxCode::Exempt),
            "b" | "zero" | "0" => Ok(TaxCode::Zero),
            "c" | "standard" | "15" => Ok(TaxCode::Standard),
            "d" | "withholding" | "5" => Ok(TaxCode::Withholding),
            _ => Err(ValidationError::NotAllowed {
                field: "tax code".to_string(),
                allowed: ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

impl Serialize for TaxCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.letter())
    }
}

impl<'de> Deserialize<'de> for TaxCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A resolved tax bracket: code, percent and the environment's numeric id.
///
/// Invariant: `percent` is `None` exactly when `code` is `Exempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    pub code: TaxCode,
    pub percent: Option<TaxRate>,
    #[serde(rename = "taxID")]
    pub tax_id: u32,
}

impl TaxBracket {
    pub fn is_exempt(&self) -> bool {
        self.percent.is_none()
    }

    /// Tax due on `amount` under this bracket (zero for exempt).
    pub fn tax_on(&self, amount: Money) -> Money {
        self.percent.map_or(Money::zero(), |rate| amount.tax_at(rate))
    }
}

// =============================================================================
// Receipt Type
// =============================================================================

/// Receipt families. Each family aggregates into its own counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReceiptType {
    /// A sale (`FiscalInvoice` in the authority's vocabulary).
    Sale,
    CreditNote,
    DebitNote,
}

impl ReceiptType {
    pub const ALL: [ReceiptType; 3] = [
        ReceiptType::Sale,
        ReceiptType::CreditNote,
        ReceiptType::DebitNote,
    ];

    pub fn authority_name(&self) -> &'static str {
        match self {
            ReceiptType::Sale => "FiscalInvoice",
            ReceiptType::CreditNote => "CreditNote",
            ReceiptType::DebitNote => "DebitNote",
        }
    }

    /// Counter carrying the sales amount for this family.
    pub fn by_tax_counter(&self) -> FiscalCounterType {
        match self {
            ReceiptType::Sale => FiscalCounterType::SaleByTax,
            ReceiptType::CreditNote => FiscalCounterType::CreditNoteByTax,
            ReceiptType::DebitNote => FiscalCounterType::DebitNoteByTax,
        }
    }

    /// Counter carrying the tax-only amount for this family.
    pub fn tax_by_tax_counter(&self) -> FiscalCounterType {
        match self {
            ReceiptType::Sale => FiscalCounterType::SaleTaxByTax,
            ReceiptType::CreditNote => FiscalCounterType::CreditNoteTaxByTax,
            ReceiptType::DebitNote => FiscalCounterType::DebitNoteTaxByTax,
        }
    }
}

impl fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.authority_name())
    }
}

impl FromStr for ReceiptType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "sale" | "fiscalinvoice" | "invoice" => Ok(ReceiptType::Sale),
            "creditnote" => Ok(ReceiptType::CreditNote),
            "debitnote" => Ok(ReceiptType::DebitNote),
            _ => Err(ValidationError::NotAllowed {
                field: "receipt type".to_string(),
                allowed: vec![
                    "FiscalInvoice".to_string(),
                    "CreditNote".to_string(),
                    "DebitNote".to_string(),
                ],
            }),
        }
    }
}

impl Serialize for ReceiptType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.authority_name())
    }
}

impl<'de> Deserialize<'de> for ReceiptType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// Payment method a receipt was settled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MoneyType {
    Cash,
    Card,
    MobileWallet,
    Coupon,
    Credit,
    BankTransfer,
    Other,
}

impl MoneyType {
    pub fn authority_name(&self) -> &'static str {
        match self {
            MoneyType::Cash => "Cash",
            MoneyType::Card => "Card",
            MoneyType::MobileWallet => "MobileWallet",
            MoneyType::Coupon => "Coupon",
            MoneyType::Credit => "Credit",
            MoneyType::BankTransfer => "BankTransfer",
            MoneyType::Other => "Other",
        }
    }

    /// Lenient parse: case and separators are ignored ("CASH", "cash",
    /// "Mobile Wallet", "bank_transfer"). Unknown values become `Other`.
    pub fn normalize(raw: &str) -> MoneyType {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "cash" => MoneyType::Cash,
            "card" | "creditcard" | "debitcard" | "swipe" => MoneyType::Card,
            "mobilewallet" | "mobile" | "ecocash" => MoneyType::MobileWallet,
            "coupon" | "voucher" => MoneyType::Coupon,
            "credit" => MoneyType::Credit,
            "banktransfer" | "bank" | "transfer" => MoneyType::BankTransfer,
            "other" => MoneyType::Other,
            _ => {
                warn!(money_type = %raw, "Unknown money type, recording as Other");
                MoneyType::Other
            }
        }
    }
}

impl fmt::Display for MoneyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.authority_name())
    }
}

impl Serialize for MoneyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.authority_name())
    }
}

impl<'de> Deserialize<'de> for MoneyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MoneyType::normalize(&raw))
    }
}

// =============================================================================
// Fiscal Counters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FiscalCounterType {
    SaleByTax,
    SaleTaxByTax,
    CreditNoteByTax,
    CreditNoteTaxByTax,
    DebitNoteByTax,
    DebitNoteTaxByTax,
    BalanceByMoneyType,
}

impl FiscalCounterType {
    pub const ALL: [FiscalCounterType; 7] = [
        FiscalCounterType::SaleByTax,
        FiscalCounterType::SaleTaxByTax,
        FiscalCounterType::CreditNoteByTax,
        FiscalCounterType::CreditNoteTaxByTax,
        FiscalCounterType::DebitNoteByTax,
        FiscalCounterType::DebitNoteTaxByTax,
        FiscalCounterType::BalanceByMoneyType,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FiscalCounterType::SaleByTax => "SaleByTax",
            FiscalCounterType::SaleTaxByTax => "SaleTaxByTax",
            FiscalCounterType::CreditNoteByTax => "CreditNoteByTax",
            FiscalCounterType::CreditNoteTaxByTax => "CreditNoteTaxByTax",
            FiscalCounterType::DebitNoteByTax => "DebitNoteByTax",
            FiscalCounterType::DebitNoteTaxByTax => "DebitNoteTaxByTax",
            FiscalCounterType::BalanceByMoneyType => "BalanceByMoneyType",
        }
    }
}

impl fmt::Display for FiscalCounterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FiscalCounterType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FiscalCounterType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "counter type".to_string(),
                allowed: FiscalCounterType::ALL
                    .iter()
                    .map(|t| t.name().to_string())
                    .collect(),
            })
    }
}

impl Serialize for FiscalCounterType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for FiscalCounterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One fiscal counter as reported when closing a day.
///
/// Field presence follows the authority contract:
/// - `tax_percent`: absent for exempt brackets and for balance counters
/// - `tax_id`: absent for balance counters
/// - `money_type`: present only for balance counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalCounter {
    #[serde(rename = "fiscalCounterType")]
    pub counter_type: FiscalCounterType,

    #[serde(rename = "fiscalCounterCurrency")]
    pub currency: String,

    #[serde(rename = "fiscalCounterTaxID", default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<u32>,

    #[serde(rename = "fiscalCounterTaxPercent", default, skip_serializing_if = "Option::is_none")]
    pub tax_percent: Option<TaxRate>,

    #[serde(rename = "fiscalCounterMoneyType", default, skip_serializing_if = "Option::is_none")]
    pub money_type: Option<MoneyType>,

    #[serde(rename = "fiscalCounterValue")]
    pub value: Money,
}

impl FiscalCounter {
    /// A `*ByTax` / `*TaxByTax` counter for one bracket.
    pub fn by_tax(
        counter_type: FiscalCounterType,
        currency: impl Into<String>,
        bracket: &TaxBracket,
        value: Money,
    ) -> Self {
        FiscalCounter {
            counter_type,
            currency: currency.into(),
            tax_id: Some(bracket.tax_id),
            tax_percent: bracket.percent,
            money_type: None,
            value,
        }
    }

    /// A `BalanceByMoneyType` counter.
    pub fn balance(currency: impl Into<String>, money_type: MoneyType, value: Money) -> Self {
        FiscalCounter {
            counter_type: FiscalCounterType::BalanceByMoneyType,
            currency: currency.into(),
            tax_id: None,
            tax_percent: None,
            money_type: Some(money_type),
            value,
        }
    }

    pub fn is_balance(&self) -> bool {
        self.counter_type == FiscalCounterType::BalanceByMoneyType
    }
}

// =============================================================================
// Receipts
// =============================================================================

/// One priced line on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub line_no: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hs_code: Option<String>,
    pub quantity: Quantity,
    pub unit_price: Money,
    /// Authoritative line amount, tax-exclusive.
    pub line_total: Money,
    pub tax: TaxBracket,
}

impl LineItem {
    pub fn tax_amount(&self) -> Money {
        self.tax.tax_on(self.line_total)
    }
}

/// One entry of a receipt's tax summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSummaryEntry {
    #[serde(rename = "taxCode")]
    pub tax_code: TaxCode,
    #[serde(rename = "taxPercent", default, skip_serializing_if = "Option::is_none")]
    pub tax_percent: Option<TaxRate>,
    #[serde(rename = "taxID")]
    pub tax_id: u32,
    #[serde(rename = "taxAmount")]
    pub tax_amount: Money,
    #[serde(rename = "salesAmountWithTax")]
    pub sales_amount_with_tax: Money,
}

/// Reference from a credit/debit note to the receipt it corrects.
///
/// Either `receipt_id` or the (`device_id`, `receipt_global_no`,
/// `fiscal_day_no`) triple identifies the original receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDebitRef {
    #[serde(rename = "receiptID", default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<u64>,
    #[serde(rename = "deviceID", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(rename = "receiptGlobalNo", default, skip_serializing_if = "Option::is_none")]
    pub receipt_global_no: Option<u64>,
    #[serde(rename = "fiscalDayNo", default, skip_serializing_if = "Option::is_none")]
    pub fiscal_day_no: Option<u32>,
}

impl CreditDebitRef {
    pub fn is_complete(&self) -> bool {
        self.receipt_id.is_some()
            || (self.device_id.is_some()
                && self.receipt_global_no.is_some()
                && self.fiscal_day_no.is_some())
    }
}

/// Signature block attached to a receipt or a CloseDay request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignature {
    /// base64(SHA-256(canonical string))
    pub hash: String,
    /// base64(RSA-PKCS#1v1.5-SHA256(canonical string))
    pub signature: String,
}

/// A receipt as recorded after signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub device_id: String,
    pub invoice_no: String,
    pub receipt_type: ReceiptType,
    pub currency: String,
    pub money_type: MoneyType,
    pub receipt_date: NaiveDateTime,
    pub fiscal_day_no: u32,
    /// Position within the fiscal day, starting at 1.
    pub counter: u32,
    /// Device-lifetime sequence, starting at 1.
    pub global_no: u64,
    pub lines: Vec<LineItem>,
    pub taxes: Vec<TaxSummaryEntry>,
    pub total: Money,
    pub signature: DeviceSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub verification_code: String,
    pub qr_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_debit_ref: Option<CreditDebitRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_receipt_id: Option<u64>,
}

// =============================================================================
// Receipt Drafts (caller input)
// =============================================================================

/// A line as submitted by the point-of-sale caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDraft {
    pub name: String,
    #[serde(default)]
    pub hs_code: Option<String>,
    #[serde(default)]
    pub quantity: Quantity,
    #[serde(default)]
    pub unit_price: Money,
    pub line_total: Money,
    /// Raw tax code; resolved leniently (unknown → standard).
    #[serde(default)]
    pub tax_code: Option<String>,
}

/// A receipt as submitted by the caller, before numbering and signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDraft {
    pub invoice_no: String,
    pub receipt_type: ReceiptType,
    #[serde(alias = "receiptCurrency")]
    pub currency: String,
    #[serde(alias = "paymentMethod", alias = "moneyTypeCode")]
    pub money_type: MoneyType,
    pub receipt_date: NaiveDateTime,
    pub lines: Vec<LineDraft>,
    /// Optional caller-computed total; rejected when it disagrees.
    #[serde(default)]
    pub receipt_total: Option<Money>,
    #[serde(default, alias = "creditDebitRef")]
    pub credit_debit_note: Option<CreditDebitRef>,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Fiscal Day
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FiscalDayStatus {
    Opened,
    Closed,
    CloseFailed,
}

impl FiscalDayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiscalDayStatus::Opened => "FiscalDayOpened",
            FiscalDayStatus::Closed => "FiscalDayClosed",
            FiscalDayStatus::CloseFailed => "FiscalDayCloseFailed",
        }
    }
}

impl fmt::Display for FiscalDayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FiscalDayStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FiscalDayOpened" => Ok(FiscalDayStatus::Opened),
            "FiscalDayClosed" => Ok(FiscalDayStatus::Closed),
            "FiscalDayCloseFailed" => Ok(FiscalDayStatus::CloseFailed),
            other => Err(ValidationError::InvalidFormat {
                field: "fiscal day status".to_string(),
                reason: format!("unknown status '{}'", other),
            }),
        }
    }
}

impl Serialize for FiscalDayStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A fiscal day as tracked locally. `day_no` is assigned by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalDay {
    pub device_id: String,
    pub day_no: u32,
    pub opened_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>,
    pub is_open: bool,
    pub status: FiscalDayStatus,
}

// =============================================================================
// Unit Tests
// =============================================================================
