//! # Receipt Chain Arithmetic
//!
//! Pure numbering rules for the receipt hash chain. The engine reads the
//! chain head from storage under the device lock and asks this module for
//! the next position.
//!
//! ```text
//!  fiscal day 7                         fiscal day 8
//!  ┌────────┐   ┌────────┐   ┌────────┐ ┌────────┐   ┌────────┐
//!  │ ctr 1  │──►│ ctr 2  │──►│ ctr 3  │ │ ctr 1  │──►│ ctr 2  │
//!  │ gno 41 │   │ gno 42 │   │ gno 43 │ │ gno 44 │   │ gno 45 │
//!  │ prev ∅ │   │ prev h1│   │ prev h2│ │ prev ∅ │   │ prev h4│
//!  └────────┘   └────────┘   └────────┘ └────────┘   └────────┘
//!
//!  counter resets per day, global number never resets,
//!  previous hash links receipts within one day only
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::Receipt;

/// What the chain looks like before the next receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    /// Receipts already recorded in the open fiscal day.
    pub receipts_in_day: u32,
    /// Hash of the last receipt recorded in the open fiscal day.
    pub last_hash_in_day: Option<String>,
    /// Highest global number ever recorded for the device.
    pub last_global_no: Option<u64>,
}

/// Numbering for the next receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPosition {
    pub counter: u32,
    pub global_no: u64,
    pub previous_hash: Option<String>,
}

impl ChainState {
    pub fn next_position(&self) -> ChainPosition {
        ChainPosition {
            counter: self.receipts_in_day + 1,
            global_no: self.last_global_no.map_or(1, |last| last + 1),
            previous_hash: if self.receipts_in_day > 0 {
                self.last_hash_in_day.clone()
            } else {
                None
            },
        }
    }
}

/// Checks that one fiscal day's receipts, ordered by counter, form an
/// unbroken chain: counters 1..n, strictly increasing global numbers, and
/// each previous hash equal to the predecessor's hash.
pub fn verify_day_chain(receipts: &[Receipt]) -> CoreResult<()> {
    let mut previous: Option<&Receipt> = None;

    for (receipt, expected_counter) in receipts.iter().zip(1u32..) {
        let broken = |reason: String| CoreError::BrokenChain {
            counter: receipt.counter,
            reason,
        };

        if receipt.counter != expected_counter {
            return Err(broken(format!("expected counter {}", expected_counter)));
        }

        match previous {
            None => {
                if receipt.previous_hash.is_some() {
                    return Err(broken("first receipt of the day carries a previous hash".into()));
                }
            }
            Some(prev) => {
                if receipt.global_no <= prev.global_no {
                    return Err(broken(format!(
                        "global number {} does not follow {}",
                        receipt.global_no, prev.global_no
                    )));
                }
                if receipt.previous_hash.as_deref() != Some(prev.signature.hash.as_str()) {
                    return Err(broken("previous hash does not match predecessor".into()));
                }
            }
        }

        previous = Some(receipt);
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
    use crate::types::{DeviceSignature, MoneyType, ReceiptType};
    use chrono::NaiveDate;

    #[test]
    fn test_first_receipt_ever() {
        let position = ChainState::default().next_position();
        assert_eq!(position.counter, 1);
        assert_eq!(position.global_no, 1);
        assert_eq!(position.previous_hash, None);
    }

    #[test]
    fn test_first_receipt_of_new_day_keeps_global_sequence() {
        let state = ChainState {
            receipts_in_day: 0,
            last_hash_in_day: None,
            last_global_no: Some(43),
        };
        let position = state.next_position();
        assert_eq!(position.counter, 1);
        assert_eq!(position.global_no, 44);
        assert_eq!(position.previous_hash, None);
    }

    #[test]
    fn test_chained_receipt() {
        let state = ChainState {
            receipts_in_day: 2,
            last_hash_in_day: Some("h2".to_string()),
            last_global_no: Some(42),
        };
        assert_eq!(
            state.next_position(),
            ChainPosition {
                counter: 3,
                global_no: 43,
                previous_hash: Some("h2".to_string()),
            }
        );
    }

    fn receipt(counter: u32, global_no: u64, hash: &str, previous: Option<&str>) -> Receipt {
        Receipt {
            device_id: "D1".to_string(),
            invoice_no: format!("INV-{}", counter),
            receipt_type: ReceiptType::Sale,
            currency: "USD".to_string(),
            money_type: MoneyType::Cash,
            receipt_date: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            fiscal_day_no: 1,
            counter,
            global_no,
            lines: Vec::new(),
            taxes: Vec::new(),
            total: Money::zero(),
            signature: DeviceSignature {
                hash: hash.to_string(),
                signature: String::new(),
            },
            previous_hash: previous.map(str::to_string),
            verification_code: String::new(),
            qr_url: String::new(),
            credit_debit_ref: None,
            notes: None,
            authority_receipt_id: None,
        }
    }

    #[test]
    fn test_verify_valid_chain() {
        let receipts = vec![
            receipt(1, 10, "h1", None),
            receipt(2, 11, "h2", Some("h1")),
            receipt(3, 12, "h3", Some("h2")),
        ];
        assert!(verify_day_chain(&receipts).is_ok());
        assert!(verify_day_chain(&[]).is_ok());
    }

    #[test]
    fn test_verify_detects_breaks() {
        let wrong_hash = vec![receipt(1, 10, "h1", None), receipt(2, 11, "h2", Some("hX"))];
        assert!(matches!(
            verify_day_chain(&wrong_hash),
            Err(CoreError::BrokenChain { counter: 2, .. })
        ));

        let repeated_global = vec![receipt(1, 10, "h1", None), receipt(2, 10, "h2", Some("h1"))];
        assert!(verify_day_chain(&repeated_global).is_err());

        let gap = vec![receipt(1, 10, "h1", None), receipt(3, 11, "h3", Some("h1"))];
        assert!(verify_day_chain(&gap).is_err());

        let first_with_suffix = vec![receipt(1, 10, "h1", Some("h0"))];
        assert!(verify_day_chain(&first_with_suffix).is_err());
    }
}
