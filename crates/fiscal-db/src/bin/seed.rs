//! # Seed Data Generator
//!
//! Populates a development database with one device, one open fiscal day
//! and a chain of receipts.
//!
//! ## Usage
//! ```bash
//! # 20 receipts on device 321 (defaults)
//! cargo run -p fiscal-db --bin seed
//!
//! # Custom amount, device and database path
//! cargo run -p fiscal-db --bin seed -- --count 200 --device 4412 --db ./data/gateway.db
//! ```
//!
//! Seeded receipts are hash-chained but carry no RSA signature; the
//! verification code is the placeholder. They are for exercising storage
//! and counters, never for submission.

use chrono::{Duration, NaiveDate, Utc};
use std::env;
use tracing_subscriber::EnvFilter;

use fiscal_core::canonical::{receipt_string, ReceiptFields};
use fiscal_core::receipt::price_draft;
use fiscal_core::signature::{document_hash, VerificationCode};
use fiscal_core::tax::{Environment, TaxCodeResolver};
use fiscal_core::{
    DeviceSignature, LineDraft, Money, MoneyType, Quantity, Receipt, ReceiptDraft, ReceiptType,
};
use fiscal_db::repository::device::Device;
use fiscal_db::{Database, DbConfig};

/// (name, unit price in cents, tax code)
const ITEMS: &[(&str, i64, &str)] = &[
    ("Bread 700g", 120, "C"),
    ("Milk 1L", 95, "B"),
    ("Maize Meal 10kg", 850, "A"),
    ("Cooking Oil 2L", 420, "C"),
    ("Sugar 2kg", 260, "C"),
    ("Rice 2kg", 310, "B"),
    ("Consulting hour", 2500, "D"),
];

const MONEY_TYPES: &[MoneyType] = &[MoneyType::Cash, MoneyType::Card, MoneyType::MobileWallet];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fiscal=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: u32 = 20;
    let mut device_id = String::from("321");
    let mut db_path = String::from("./fiscal_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--device" => {
                if i + 1 < args.len() {
                    device_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Fiscal Gateway Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of receipts to generate (default: 20)");
                println!("      --device <ID>    Device id (default: 321)");
                println!("  -d, --db <PATH>      Database file path (default: ./fiscal_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Fiscal Gateway Seed Data Generator");
    println!("==================================");
    println!("Database: {}", db_path);
    println!("Device:   {}", device_id);
    println!("Receipts: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    db.devices().upsert(&Device::new(device_id.as_str())).await?;

    if db.fiscal_days().get_open(&device_id).await?.is_some() {
        println!("⚠ Device {} already has an open fiscal day", device_id);
        println!("  Skipping seed to avoid breaking its receipt chain.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let fiscal_day_no = db
        .fiscal_days()
        .list_for_device(&device_id, 1)
        .await?
        .first()
        .map_or(1, |day| day.day_no + 1);
    let opened_at = Utc::now().naive_utc();
    db.fiscal_days()
        .insert_open(&device_id, fiscal_day_no, opened_at)
        .await?;
    println!("✓ Opened fiscal day {}", fiscal_day_no);

    let resolver = TaxCodeResolver::new(Environment::Test);
    let mut global_no = db
        .receipts()
        .last_for_device(&device_id)
        .await?
        .map_or(0, |r| r.global_no);
    let mut previous_hash: Option<String> = None;

    for counter in 1..=count {
        global_no += 1;
        let receipt_date = opened_at + Duration::minutes(i64::from(counter) * 7);
        let draft = sample_draft(counter, receipt_date.date(), receipt_date);
        let priced = price_draft(&draft, &resolver)?;

        let canonical = receipt_string(&ReceiptFields {
            device_id: &device_id,
            receipt_type: draft.receipt_type,
            currency: &draft.currency,
            global_no,
            receipt_date,
            total: priced.total,
            taxes: &priced.taxes,
            previous_hash: previous_hash.as_deref(),
        });
        let hash = document_hash(&canonical);

        let receipt = Receipt {
            device_id: device_id.clone(),
            invoice_no: draft.invoice_no.clone(),
            receipt_type: draft.receipt_type,
            currency: draft.currency.clone(),
            money_type: draft.money_type,
            receipt_date,
            fiscal_day_no,
            counter,
            global_no,
            lines: priced.lines,
            taxes: priced.taxes,
            total: priced.total,
            signature: DeviceSignature {
                hash: hash.clone(),
                signature: String::new(),
            },
            previous_hash: previous_hash.clone(),
            verification_code: VerificationCode::placeholder().as_str().to_string(),
            qr_url: String::new(),
            credit_debit_ref: None,
            notes: None,
            authority_receipt_id: None,
        };

        if let Err(e) = db.receipts().insert(&receipt).await {
            eprintln!("Failed to insert {}: {}", receipt.invoice_no, e);
            continue;
        }
        previous_hash = Some(hash);

        if counter % 10 == 0 {
            println!("  Generated {} receipts...", counter);
        }
    }

    let stored = db.receipts().count_for_day(&device_id, fiscal_day_no).await?;
    println!();
    println!("✓ Seed complete: {} receipts in fiscal day {}", stored, fiscal_day_no);

    Ok(())
}

/// Builds a deterministic sale of one to three lines.
fn sample_draft(
    counter: u32,
    day: NaiveDate,
    receipt_date: chrono::NaiveDateTime,
) -> ReceiptDraft {
    let seed = counter as usize;
    let line_count = 1 + seed % 3;

    let lines = (0..line_count)
        .map(|offset| {
            let (name, unit_cents, tax_code) = ITEMS[(seed + offset * 3) % ITEMS.len()];
            let units = 1 + ((seed + offset) % 4) as i64;
            LineDraft {
                name: name.to_string(),
                hs_code: None,
                quantity: Quantity::from_units(units),
                unit_price: Money::from_cents(unit_cents),
                line_total: Money::from_cents(unit_cents * units),
                tax_code: Some(tax_code.to_string()),
            }
        })
        .collect();

    ReceiptDraft {
        invoice_no: format!("SEED-{}-{:05}", day.format("%Y%m%d"), counter),
        receipt_type: ReceiptType::Sale,
        currency: if counter % 4 == 0 { "ZWG" } else { "USD" }.to_string(),
        money_type: MONEY_TYPES[seed % MONEY_TYPES.len()],
        receipt_date,
        lines,
        receipt_total: None,
        credit_debit_note: None,
        notes: None,
    }
}
