//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tempfile::TempDir;

use fiscal_core::{CreditDebitRef, LineDraft, Money, MoneyType, Quantity, ReceiptDraft, ReceiptType};
use fiscal_db::{Database, DbConfig};
use fiscal_engine::{EngineConfig, FiscalService};

pub const DEVICE: &str = "321";
pub const TEST_KEY: &str = include_str!("../fixtures/test_device.key");

/// A service over an in-memory database, with the fixture key installed
/// for [`DEVICE`]. The key directory lives as long as the returned guard.
pub struct Harness {
    pub service: Arc<FiscalService>,
    pub db: Arc<Database>,
    _key_dir: TempDir,
}

pub async fn harness() -> Harness {
    let key_dir = TempDir::new().unwrap();
    std::fs::write(key_dir.path().join(format!("{}.key", DEVICE)), TEST_KEY).unwrap();

    let mut config = EngineConfig::default();
    config.keys.key_dir = key_dir.path().to_path_buf();

    let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
    let service = Arc::new(FiscalService::new(config, db.clone()));

    Harness {
        service,
        db,
        _key_dir: key_dir,
    }
}

pub fn day_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(7, 0, 0)
        .unwrap()
}

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn line(name: &str, cents: i64, tax_code: &str) -> LineDraft {
    LineDraft {
        name: name.to_string(),
        hs_code: None,
        quantity: Quantity::from_units(1),
        unit_price: Money::from_cents(cents),
        line_total: Money::from_cents(cents),
        tax_code: Some(tax_code.to_string()),
    }
}

pub fn sale(invoice_no: &str, lines: Vec<LineDraft>) -> ReceiptDraft {
    ReceiptDraft {
        invoice_no: invoice_no.to_string(),
        receipt_type: ReceiptType::Sale,
        currency: "USD".to_string(),
        money_type: MoneyType::Cash,
        receipt_date: at(9, 30),
        lines,
        receipt_total: None,
        credit_debit_note: None,
        notes: None,
    }
}

pub fn credit_note(invoice_no: &str, original_global_no: u64, lines: Vec<LineDraft>) -> ReceiptDraft {
    ReceiptDraft {
        receipt_type: ReceiptType::CreditNote,
        credit_debit_note: Some(CreditDebitRef {
            receipt_id: None,
            device_id: Some(DEVICE.to_string()),
            receipt_global_no: Some(original_global_no),
            fiscal_day_no: Some(1),
        }),
        ..sale(invoice_no, lines)
    }
}
