//! # CloseDay Preview
//!
//! Prints what a device would send at CloseDay without signing or sending
//! anything: the fiscal counters, the canonical string and the chain audit.
//!
//! ## Usage
//! ```bash
//! # Open day of device 321 in the seeded dev database
//! cargo run -p fiscal-engine --bin fiscal-preview
//!
//! # A specific stored day, with an explicit config file
//! cargo run -p fiscal-engine --bin fiscal-preview -- --device 4412 --day 12 --config ./fiscal.toml
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fiscal_db::{Database, DbConfig};
use fiscal_engine::{EngineConfig, FiscalService, FiscalStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fiscal_engine=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut device_id = String::from("321");
    let mut db_path = String::from("./fiscal_dev.db");
    let mut config_path: Option<PathBuf> = None;
    let mut day_no: Option<u32> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--device" => {
                if i + 1 < args.len() {
                    device_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--day" => {
                if i + 1 < args.len() {
                    day_no = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: fiscal-preview [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --device <ID>      Device id (default: 321)");
                println!("  --day <NO>         Fiscal day number (default: the open day)");
                println!("  -d, --db <PATH>    Database path (default: ./fiscal_dev.db)");
                println!("  --config <PATH>    Config file (default: platform config dir)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = EngineConfig::load(config_path)?;
    let db = Arc::new(Database::new(DbConfig::new(&db_path)).await?);

    let day_no = match day_no {
        Some(no) => no,
        None => match db.open_fiscal_day(&device_id).await? {
            Some(day) => day.day_no,
            None => {
                println!("Device {} has no open fiscal day", device_id);
                return Ok(());
            }
        },
    };

    let service = FiscalService::new(config, db);

    println!("Device {} / fiscal day {}", device_id, day_no);
    println!();

    let counters = service.compute_fiscal_counters(&device_id, day_no).await?;
    println!("Fiscal counters ({}):", counters.len());
    for counter in &counters {
        println!(
            "  {:<28} {:<4} tax_id={:<6} money_type={:<12} {}",
            counter.counter_type.name(),
            counter.currency,
            counter.tax_id.map(|id| id.to_string()).unwrap_or_default(),
            counter
                .money_type
                .map(|m| m.authority_name().to_string())
                .unwrap_or_default(),
            counter.value
        );
    }
    println!();

    match service.build_close_day_signing_payload(&device_id, day_no).await {
        Ok(payload) => {
            println!("Receipts in day: {}", payload.receipt_counter);
            println!("Canonical string:");
            println!("  {}", payload.canonical_string);
            println!();
            println!("Unsigned payload:");
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Err(e) => println!("CloseDay payload unavailable: {}", e),
    }

    match service.audit_fiscal_day(&device_id, day_no).await {
        Ok(()) => println!("Receipt chain intact"),
        Err(e) => println!("Receipt chain check failed: {}", e),
    }

    Ok(())
}
