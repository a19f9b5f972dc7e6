//! # Storage Seam
//!
//! The lookups the engine needs from persistence, as a trait. The gateway
//! runs on [`fiscal_db::Database`]; tests and embedders can supply their own
//! implementation.
//!
//! Implementations translate storage-level conflicts into domain errors
//! (a duplicate invoice number is `DuplicateInvoice`, not a constraint name).

use async_trait::async_trait;
use chrono::NaiveDateTime;

use fiscal_core::{CoreError, FiscalDay, Receipt};
use fiscal_db::{Database, DbError};

use crate::error::EngineResult;

#[async_trait]
pub trait FiscalStore: Send + Sync {
    /// Receipts of one fiscal day with their lines, ordered by receipt counter.
    async fn list_receipts(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<Vec<Receipt>>;

    /// The device's receipt with the highest global number.
    async fn last_receipt(&self, device_id: &str) -> EngineResult<Option<Receipt>>;

    async fn open_fiscal_day(&self, device_id: &str) -> EngineResult<Option<FiscalDay>>;

    async fn fiscal_day(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<Option<FiscalDay>>;

    /// The device's day with the highest number, open or closed.
    async fn latest_fiscal_day(&self, device_id: &str) -> EngineResult<Option<FiscalDay>>;

    async fn receipt_exists(&self, device_id: &str, invoice_no: &str) -> EngineResult<bool>;

    /// Records a signed receipt; it becomes the device's chain head.
    async fn insert_receipt(&self, receipt: &Receipt) -> EngineResult<()>;

    async fn insert_fiscal_day(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        opened_at: NaiveDateTime,
    ) -> EngineResult<FiscalDay>;

    async fn close_fiscal_day(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        closed_at: NaiveDateTime,
    ) -> EngineResult<()>;

    async fn mark_close_failed(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<()>;
}

#[async_trait]
impl FiscalStore for Database {
    async fn list_receipts(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<Vec<Receipt>> {
        Ok(self.receipts().list_for_day(device_id, fiscal_day_no).await?)
    }

    async fn last_receipt(&self, device_id: &str) -> EngineResult<Option<Receipt>> {
        Ok(self.receipts().last_for_device(device_id).await?)
    }

    async fn open_fiscal_day(&self, device_id: &str) -> EngineResult<Option<FiscalDay>> {
        Ok(self.fiscal_days().get_open(device_id).await?)
    }

    async fn fiscal_day(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<Option<FiscalDay>> {
        Ok(self.fiscal_days().get(device_id, fiscal_day_no).await?)
    }

    async fn latest_fiscal_day(&self, device_id: &str) -> EngineResult<Option<FiscalDay>> {
        let mut days = self.fiscal_days().list_for_device(device_id, 1).await?;
        Ok(days.pop())
    }

    async fn receipt_exists(&self, device_id: &str, invoice_no: &str) -> EngineResult<bool> {
        Ok(self.receipts().exists(device_id, invoice_no).await?)
    }

    async fn insert_receipt(&self, receipt: &Receipt) -> EngineResult<()> {
        match self.receipts().insert(receipt).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_unique_on("invoice_no") => {
                Err(CoreError::DuplicateInvoice {
                    device_id: receipt.device_id.clone(),
                    invoice_no: receipt.invoice_no.clone(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_fiscal_day(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        opened_at: NaiveDateTime,
    ) -> EngineResult<FiscalDay> {
        match self
            .fiscal_days()
            .insert_open(device_id, fiscal_day_no, opened_at)
            .await
        {
            Ok(day) => Ok(day),
            // The one-open-day index names only the device column
            Err(err @ DbError::UniqueViolation { .. }) if !err.is_unique_on("fiscal_day_no") => {
                Err(CoreError::FiscalDayAlreadyOpen {
                    device_id: device_id.to_string(),
                    fiscal_day_no,
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close_fiscal_day(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        closed_at: NaiveDateTime,
    ) -> EngineResult<()> {
        self.fiscal_days()
            .mark_closed(device_id, fiscal_day_no, closed_at)
            .await
            .map_err(|e| day_error(e, device_id, fiscal_day_no))
    }

    async fn mark_close_failed(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<()> {
        self.fiscal_days()
            .mark_close_failed(device_id, fiscal_day_no)
            .await
            .map_err(|e| day_error(e, device_id, fiscal_day_no))
    }
}

fn day_error(err: DbError, device_id: &str, fiscal_day_no: u32) -> crate::error::EngineError {
    match err {
        DbError::NotFound { .. } => CoreError::FiscalDayNotFound {
            device_id: device_id.to_string(),
            fiscal_day_no,
        }
        .into(),
        other => other.into(),
    }
}
