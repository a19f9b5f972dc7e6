//! # Signing Payloads
//!
//! What the service hands back to the route layer. Field names of the
//! documents sent to the authority are fixed by its API and reproduced
//! exactly.
//!
//! ## CloseDay request body
//! ```json
//! {
//!   "fiscalDayNo": 84,
//!   "fiscalDayCounters": [
//!     { "fiscalCounterType": "SaleByTax", "fiscalCounterCurrency": "USD",
//!       "fiscalCounterTaxID": 3, "fiscalCounterTaxPercent": 15.0,
//!       "fiscalCounterValue": 100.0 },
//!     { "fiscalCounterType": "BalanceByMoneyType", "fiscalCounterCurrency": "USD",
//!       "fiscalCounterMoneyType": "Cash", "fiscalCounterValue": 115.0 }
//!   ],
//!   "fiscalDayDeviceSignature": { "hash": "...", "signature": "..." },
//!   "receiptCounter": 1
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use fiscal_core::{DeviceSignature, FiscalCounter, Receipt};

// =============================================================================
// CloseDay
// =============================================================================

/// Everything needed to sign a CloseDay, before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDaySigningPayload {
    pub device_id: String,
    pub fiscal_day_no: u32,
    /// Opening date of the fiscal day, as signed.
    pub fiscal_day_date: NaiveDate,
    pub counters: Vec<FiscalCounter>,
    /// Receipts recorded in the day.
    pub receipt_counter: u32,
    pub canonical_string: String,
}

/// A signed CloseDay, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedCloseDay {
    pub payload: CloseDaySigningPayload,
    pub signature: DeviceSignature,
    pub verification_code: String,
}

impl SignedCloseDay {
    /// The request body for the authority's CloseDay endpoint.
    pub fn request(&self) -> CloseDayRequest {
        CloseDayRequest {
            fiscal_day_no: self.payload.fiscal_day_no,
            fiscal_day_counters: self.payload.counters.clone(),
            fiscal_day_device_signature: self.signature.clone(),
            receipt_counter: self.payload.receipt_counter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDayRequest {
    pub fiscal_day_no: u32,
    pub fiscal_day_counters: Vec<FiscalCounter>,
    pub fiscal_day_device_signature: DeviceSignature,
    pub receipt_counter: u32,
}

// =============================================================================
// SubmitReceipt
// =============================================================================

/// A numbered and signed receipt, with the artifacts derived from its
/// signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceiptSigningPayload {
    /// The draft with counter, global number, taxes, total and chain
    /// fields filled in.
    pub receipt: Receipt,
    pub canonical_string: String,
    #[serde(rename = "receiptDeviceSignature")]
    pub signature: DeviceSignature,
    pub verification_code: String,
    pub qr_url: String,
}

impl SubmitReceiptSigningPayload {
    pub fn hash(&self) -> &str {
        &self.signature.hash
    }
}

#[cfg(test)]
mod tests {
    use fiscal_core::tax::{Environment, TaxCodeResolver};
    use fiscal_core::{Money, MoneyType, TaxCode};

    use super::*;

    #[test]
    fn test_close_day_request_field_names() {
        let resolver = TaxCodeResolver::new(Environment::Test);
        let signed = SignedCloseDay {
            payload: CloseDaySigningPayload {
                device_id: "321".to_string(),
                fiscal_day_no: 84,
                fiscal_day_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                counters: vec![
                    FiscalCounter::by_tax(
                        fiscal_core::FiscalCounterType::SaleByTax,
                        "USD",
                        &resolver.bracket(TaxCode::Exempt),
                        Money::from_cents(2500),
                    ),
                    FiscalCounter::balance("USD", MoneyType::Cash, Money::from_cents(2500)),
                ],
                receipt_counter: 1,
                canonical_string: String::new(),
            },
            signature: DeviceSignature {
                hash: "h".to_string(),
                signature: "s".to_string(),
            },
            verification_code: "0000000000000000".to_string(),
        };

        let json = serde_json::to_value(signed.request()).unwrap();
        assert_eq!(json["fiscalDayNo"], 84);
        assert_eq!(json["receiptCounter"], 1);
        assert_eq!(json["fiscalDayDeviceSignature"]["hash"], "h");

        let exempt = &json["fiscalDayCounters"][0];
        assert_eq!(exempt["fiscalCounterType"], "SaleByTax");
        assert_eq!(exempt["fiscalCounterTaxID"], 1);
        assert!(exempt.get("fiscalCounterTaxPercent").is_none());
        assert!(exempt.get("fiscalCounterMoneyType").is_none());

        let balance = &json["fiscalDayCounters"][1];
        assert_eq!(balance["fiscalCounterMoneyType"], "Cash");
        assert!(balance.get("fiscalCounterTaxID").is_none());
        assert_eq!(balance["fiscalCounterValue"], 25.0);

        let parsed: CloseDayRequest = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, signed.request());
    }
}
