//! The service over a non-SQLite store, and the chain audit catching edits.

mod common;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use common::{day_start, line, sale, DEVICE, TEST_KEY};

use fiscal_core::{
    CoreError, FiscalCounterType, FiscalDay, FiscalDayStatus, LineDraft, Money, Receipt,
};
use fiscal_engine::{EngineConfig, EngineError, EngineResult, FiscalService, FiscalStore};

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Default)]
struct MemoryStore {
    days: Mutex<Vec<FiscalDay>>,
    receipts: Mutex<Vec<Receipt>>,
}

impl MemoryStore {
    fn tamper(&self, global_no: u64, edit: impl FnOnce(&mut Receipt)) {
        let mut receipts = self.receipts.lock().unwrap();
        let receipt = receipts
            .iter_mut()
            .find(|r| r.global_no == global_no)
            .unwrap();
        edit(receipt);
    }
}

#[async_trait]
impl FiscalStore for MemoryStore {
    async fn list_receipts(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<Vec<Receipt>> {
        let mut out: Vec<Receipt> = self
            .receipts
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.device_id == device_id && r.fiscal_day_no == fiscal_day_no)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.counter);
        Ok(out)
    }

    async fn last_receipt(&self, device_id: &str) -> EngineResult<Option<Receipt>> {
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.device_id == device_id)
            .max_by_key(|r| r.global_no)
            .cloned())
    }

    async fn open_fiscal_day(&self, device_id: &str) -> EngineResult<Option<FiscalDay>> {
        Ok(self
            .days
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.device_id == device_id && d.is_open)
            .cloned())
    }

    async fn fiscal_day(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<Option<FiscalDay>> {
        Ok(self
            .days
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.device_id == device_id && d.day_no == fiscal_day_no)
            .cloned())
    }

    async fn latest_fiscal_day(&self, device_id: &str) -> EngineResult<Option<FiscalDay>> {
        Ok(self
            .days
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.device_id == device_id)
            .max_by_key(|d| d.day_no)
            .cloned())
    }

    async fn receipt_exists(&self, device_id: &str, invoice_no: &str) -> EngineResult<bool> {
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.device_id == device_id && r.invoice_no == invoice_no))
    }

    async fn insert_receipt(&self, receipt: &Receipt) -> EngineResult<()> {
        self.receipts.lock().unwrap().push(receipt.clone());
        Ok(())
    }

    async fn insert_fiscal_day(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        opened_at: NaiveDateTime,
    ) -> EngineResult<FiscalDay> {
        let day = FiscalDay {
            device_id: device_id.to_string(),
            day_no: fiscal_day_no,
            opened_at,
            closed_at: None,
            is_open: true,
            status: FiscalDayStatus::Opened,
        };
        self.days.lock().unwrap().push(day.clone());
        Ok(day)
    }

    async fn close_fiscal_day(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        closed_at: NaiveDateTime,
    ) -> EngineResult<()> {
        let mut days = self.days.lock().unwrap();
        let day = days
            .iter_mut()
            .find(|d| d.device_id == device_id && d.day_no == fiscal_day_no)
            .ok_or_else(|| CoreError::FiscalDayNotFound {
                device_id: device_id.to_string(),
                fiscal_day_no,
            })?;
        day.is_open = false;
        day.closed_at = Some(closed_at);
        day.status = FiscalDayStatus::Closed;
        Ok(())
    }

    async fn mark_close_failed(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<()> {
        let mut days = self.days.lock().unwrap();
        if let Some(day) = days
            .iter_mut()
            .find(|d| d.device_id == device_id && d.day_no == fiscal_day_no && d.is_open)
        {
            day.status = FiscalDayStatus::CloseFailed;
        }
        Ok(())
    }
}

fn memory_service() -> (FiscalService, Arc<MemoryStore>, TempDir) {
    let key_dir = TempDir::new().unwrap();
    std::fs::write(key_dir.path().join(format!("{}.key", DEVICE)), TEST_KEY).unwrap();

    let mut config = EngineConfig::default();
    config.keys.key_dir = key_dir.path().to_path_buf();

    let store = Arc::new(MemoryStore::default());
    let service = FiscalService::new(config, store.clone());
    (service, store, key_dir)
}

async fn three_receipt_day() -> (FiscalService, Arc<MemoryStore>, TempDir) {
    let (service, store, key_dir) = memory_service();
    service.record_day_opened(DEVICE, 1, day_start()).await.unwrap();
    for n in 1..=3 {
        let draft = sale(&format!("INV-{}", n), vec![line("Widget", 1000, "C")]);
        service.submit_receipt(DEVICE, &draft, None).await.unwrap();
    }
    (service, store, key_dir)
}

// =============================================================================
// Audit
// =============================================================================

#[tokio::test]
async fn test_audit_passes_on_untouched_day() {
    let (service, _store, _keys) = three_receipt_day().await;
    service.audit_fiscal_day(DEVICE, 1).await.unwrap();
}

#[tokio::test]
async fn test_audit_catches_edited_total() {
    let (service, store, _keys) = three_receipt_day().await;
    store.tamper(2, |r| r.total = Money::from_cents(1));

    let err = service.audit_fiscal_day(DEVICE, 1).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::BrokenChain { counter: 2, .. })
    ));
}

#[tokio::test]
async fn test_audit_catches_broken_link() {
    let (service, store, _keys) = three_receipt_day().await;
    store.tamper(3, |r| r.previous_hash = Some("bogus".to_string()));

    let err = service.audit_fiscal_day(DEVICE, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::BrokenChain { counter: 3, .. })));
}

// =============================================================================
// Counter Properties
// =============================================================================

fn arb_line() -> impl Strategy<Value = LineDraft> {
    (1i64..500_000, prop::sample::select(vec!["A", "B", "C", "D"]))
        .prop_map(|(cents, code)| line("Item", cents, code))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_counters_balance_against_receipts(
        receipts in prop::collection::vec(prop::collection::vec(arb_line(), 1..4), 1..6)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (service, store, _keys) = memory_service();
            service.record_day_opened(DEVICE, 1, day_start()).await.unwrap();

            for (n, lines) in receipts.iter().enumerate() {
                let draft = sale(&format!("INV-{}", n), lines.clone());
                service.submit_receipt(DEVICE, &draft, None).await.unwrap();
            }

            let counters = service.compute_fiscal_counters(DEVICE, 1).await.unwrap();
            let stored = store.list_receipts(DEVICE, 1).await.unwrap();

            let paid: Money = stored.iter().map(|r| r.total).sum();
            let balance: Money = counters.iter().filter(|c| c.is_balance()).map(|c| c.value).sum();
            assert_eq!(balance, paid);

            let net: Money = receipts
                .iter()
                .flatten()
                .map(|l| l.line_total)
                .sum();
            let by_tax: Money = counters
                .iter()
                .filter(|c| c.counter_type == FiscalCounterType::SaleByTax)
                .map(|c| c.value)
                .sum();
            assert_eq!(by_tax, net);

            let numbers: Vec<u64> = stored.iter().map(|r| r.global_no).collect();
            assert_eq!(numbers, (1..=receipts.len() as u64).collect::<Vec<_>>());

            service.audit_fiscal_day(DEVICE, 1).await.unwrap();
        });
    }
}
