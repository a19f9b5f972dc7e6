//! # Fiscal Service
//!
//! The operations the route layer calls. Each one is a single logical
//! transaction for one device.
//!
//! ## SubmitReceipt Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  validate draft ──► acquire device lock ─────────────────────┐          │
//! │                          │                                   │ held     │
//! │                          ▼                                   │          │
//! │                  open fiscal day? ── no ──► NoOpenFiscalDay  │          │
//! │                          │                                   │          │
//! │                  invoice already used? ── yes ──► Duplicate  │          │
//! │                          │                                   │          │
//! │                  price lines, tax summary, total             │          │
//! │                          │                                   │          │
//! │                  chain head ──► counter, global no, prev hash│          │
//! │                          │                                   │          │
//! │                  canonical string ──► sign ──► code, QR url  │          │
//! │                          │                                   │          │
//! │                  PendingReceipt ──► commit() records receipt ┘          │
//! │                                     drop()   records nothing            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use fiscal_core::canonical::{close_day_string, receipt_string, CloseDayFields, ReceiptFields};
use fiscal_core::chain::verify_day_chain;
use fiscal_core::counters::CounterAggregator;
use fiscal_core::qr::QrCodeEncoder;
use fiscal_core::receipt::price_draft;
use fiscal_core::signature::{document_hash, VerificationCode};
use fiscal_core::tax::TaxCodeResolver;
use fiscal_core::validation::{validate_device_id, validate_receipt_draft};
use fiscal_core::{CoreError, FiscalCounter, FiscalDay, Receipt, ReceiptDraft};

use crate::chain::ReceiptChainTracker;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::keystore::KeyStore;
use crate::locks::{DeviceGuard, DeviceLocks};
use crate::payload::{CloseDaySigningPayload, SignedCloseDay, SubmitReceiptSigningPayload};
use crate::store::FiscalStore;

// =============================================================================
// Service
// =============================================================================

pub struct FiscalService {
    config: EngineConfig,
    store: Arc<dyn FiscalStore>,
    keys: KeyStore,
    locks: DeviceLocks,
    resolver: TaxCodeResolver,
    aggregator: CounterAggregator,
    qr: QrCodeEncoder,
}

impl FiscalService {
    pub fn new(config: EngineConfig, store: Arc<dyn FiscalStore>) -> Self {
        let resolver = config.resolver();
        let aggregator = CounterAggregator::new(resolver, config.counter_filter());

        info!(
            environment = %config.environment(),
            qr_format = %config.authority.qr_format,
            key_dir = %config.key_dir().display(),
            "Fiscal service configured"
        );

        FiscalService {
            keys: KeyStore::new(config.key_dir()),
            locks: DeviceLocks::new(),
            qr: config.qr_encoder(),
            resolver,
            aggregator,
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    // =========================================================================
    // Fiscal Counters
    // =========================================================================

    /// Counters for a status query. A day without receipts yields an empty
    /// list.
    pub async fn compute_fiscal_counters(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
    ) -> EngineResult<Vec<FiscalCounter>> {
        validate_device_id(device_id)?;
        let receipts = self.store.list_receipts(device_id, fiscal_day_no).await?;
        Ok(self.aggregator.aggregate(&receipts))
    }

    // =========================================================================
    // CloseDay
    // =========================================================================

    /// Builds the unsigned CloseDay payload for a stored fiscal day.
    ///
    /// ## Errors
    /// - `FiscalDayNotFound` when the day was never recorded
    /// - `EmptyFiscalDay` when the day has no receipts
    pub async fn build_close_day_signing_payload(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
    ) -> EngineResult<CloseDaySigningPayload> {
        validate_device_id(device_id)?;
        let day = self
            .store
            .fiscal_day(device_id, fiscal_day_no)
            .await?
            .ok_or_else(|| CoreError::FiscalDayNotFound {
                device_id: device_id.to_string(),
                fiscal_day_no,
            })?;
        self.close_day_payload(&day).await
    }

    async fn close_day_payload(&self, day: &FiscalDay) -> EngineResult<CloseDaySigningPayload> {
        let receipts = self.store.list_receipts(&day.device_id, day.day_no).await?;
        let counters = self
            .aggregator
            .for_close_day(&day.device_id, day.day_no, &receipts)?;

        let fiscal_day_date = day.opened_at.date();
        let canonical_string = close_day_string(&CloseDayFields {
            device_id: &day.device_id,
            fiscal_day_no: day.day_no,
            fiscal_day_date,
            counters: &counters,
        });

        debug!(
            device_id = %day.device_id,
            fiscal_day_no = day.day_no,
            canonical = %canonical_string,
            "CloseDay canonical string built"
        );

        Ok(CloseDaySigningPayload {
            device_id: day.device_id.clone(),
            fiscal_day_no: day.day_no,
            fiscal_day_date,
            counters,
            receipt_counter: u32::try_from(receipts.len()).unwrap_or(u32::MAX),
            canonical_string,
        })
    }

    /// Signs the CloseDay for the device's open fiscal day.
    ///
    /// The caller names the day it believes is open; a different stored
    /// open day is rejected with both numbers.
    pub async fn close_day(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<SignedCloseDay> {
        validate_device_id(device_id)?;
        let _guard = self.locks.acquire(device_id).await;

        let day = self.require_open_day(device_id).await?;
        if day.day_no != fiscal_day_no {
            return Err(CoreError::FiscalDayMismatch {
                expected: day.day_no,
                provided: fiscal_day_no,
            }
            .into());
        }

        let payload = self.close_day_payload(&day).await?;
        let signer = self.keys.signer(device_id).await?;
        let signature = signer.sign(&payload.canonical_string)?;
        let verification_code = VerificationCode::from_signature_or_placeholder(&signature.signature);

        info!(
            device_id = %device_id,
            fiscal_day_no,
            counters = payload.counters.len(),
            receipts = payload.receipt_counter,
            "CloseDay signed"
        );

        Ok(SignedCloseDay {
            payload,
            signature,
            verification_code: verification_code.as_str().to_string(),
        })
    }

    // =========================================================================
    // Fiscal Day Bookkeeping
    // =========================================================================

    /// Records a day the authority has opened. The number must exceed every
    /// day already recorded for the device.
    pub async fn record_day_opened(
        &self,
        device_id: &str,
        fiscal_day_no: u32,
        opened_at: NaiveDateTime,
    ) -> EngineResult<FiscalDay> {
        validate_device_id(device_id)?;
        let _guard = self.locks.acquire(device_id).await;

        if let Some(open) = self.store.open_fiscal_day(device_id).await? {
            return Err(CoreError::FiscalDayAlreadyOpen {
                device_id: device_id.to_string(),
                fiscal_day_no: open.day_no,
            }
            .into());
        }

        if let Some(latest) = self.store.latest_fiscal_day(device_id).await? {
            if fiscal_day_no <= latest.day_no {
                return Err(CoreError::FiscalDayNotIncreasing {
                    device_id: device_id.to_string(),
                    latest: latest.day_no,
                    provided: fiscal_day_no,
                }
                .into());
            }
        }

        let day = self
            .store
            .insert_fiscal_day(device_id, fiscal_day_no, opened_at)
            .await?;
        info!(device_id = %device_id, fiscal_day_no, "Fiscal day opened");
        Ok(day)
    }

    /// Records that the authority accepted the close.
    pub async fn record_day_closed(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<()> {
        validate_device_id(device_id)?;
        let _guard = self.locks.acquire(device_id).await;

        self.store
            .close_fiscal_day(device_id, fiscal_day_no, Utc::now().naive_utc())
            .await?;
        info!(device_id = %device_id, fiscal_day_no, "Fiscal day closed");
        Ok(())
    }

    /// Records that the authority rejected the close. The day stays open.
    pub async fn record_close_failed(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<()> {
        validate_device_id(device_id)?;
        let _guard = self.locks.acquire(device_id).await;

        self.store.mark_close_failed(device_id, fiscal_day_no).await?;
        warn!(device_id = %device_id, fiscal_day_no, "Fiscal day close rejected");
        Ok(())
    }

    // =========================================================================
    // SubmitReceipt
    // =========================================================================

    /// Numbers and signs a receipt, holding the device lock until the
    /// returned [`PendingReceipt`] is committed or dropped.
    pub async fn build_submit_receipt_signing_payload(
        &self,
        device_id: &str,
        draft: &ReceiptDraft,
    ) -> EngineResult<PendingReceipt> {
        validate_device_id(device_id)?;
        validate_receipt_draft(draft, &self.config.counters.currencies)?;

        let guard = self.locks.acquire(device_id).await;

        let day = self.require_open_day(device_id).await?;

        if self.store.receipt_exists(device_id, &draft.invoice_no).await? {
            return Err(CoreError::DuplicateInvoice {
                device_id: device_id.to_string(),
                invoice_no: draft.invoice_no.clone(),
            }
            .into());
        }

        let priced = price_draft(draft, &self.resolver)?;
        let position = ReceiptChainTracker::new(self.store.as_ref())
            .position(&day)
            .await?;

        let canonical_string = receipt_string(&ReceiptFields {
            device_id,
            receipt_type: draft.receipt_type,
            currency: &draft.currency,
            global_no: position.global_no,
            receipt_date: draft.receipt_date,
            total: priced.total,
            taxes: &priced.taxes,
            previous_hash: position.previous_hash.as_deref(),
        });

        debug!(
            device_id = %device_id,
            global_no = position.global_no,
            counter = position.counter,
            canonical = %canonical_string,
            "SubmitReceipt canonical string built"
        );

        let signer = self.keys.signer(device_id).await?;
        let signature = signer.sign(&canonical_string)?;
        let verification_code = VerificationCode::from_signature_or_placeholder(&signature.signature);
        let qr_url = self.qr.build(
            device_id,
            &self.config.qr_base_url(),
            draft.receipt_date.date(),
            position.global_no,
            &signature.signature,
        );

        let receipt = Receipt {
            device_id: device_id.to_string(),
            invoice_no: draft.invoice_no.clone(),
            receipt_type: draft.receipt_type,
            currency: draft.currency.clone(),
            money_type: draft.money_type,
            receipt_date: draft.receipt_date,
            fiscal_day_no: day.day_no,
            counter: position.counter,
            global_no: position.global_no,
            lines: priced.lines,
            taxes: priced.taxes,
            total: priced.total,
            signature: signature.clone(),
            previous_hash: position.previous_hash,
            verification_code: verification_code.as_str().to_string(),
            qr_url: qr_url.clone(),
            credit_debit_ref: draft.credit_debit_note.clone(),
            notes: draft.notes.clone(),
            authority_receipt_id: None,
        };

        Ok(PendingReceipt {
            payload: SubmitReceiptSigningPayload {
                receipt,
                canonical_string,
                signature,
                verification_code: verification_code.as_str().to_string(),
                qr_url,
            },
            store: Arc::clone(&self.store),
            guard,
        })
    }

    /// Builds, signs and records a receipt in one step.
    pub async fn submit_receipt(
        &self,
        device_id: &str,
        draft: &ReceiptDraft,
        authority_receipt_id: Option<u64>,
    ) -> EngineResult<SubmitReceiptSigningPayload> {
        self.build_submit_receipt_signing_payload(device_id, draft)
            .await?
            .commit(authority_receipt_id)
            .await
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Checks a stored day's chain: numbering, previous-hash links, and
    /// that each stored hash matches the receipt's recomputed canonical
    /// string.
    pub async fn audit_fiscal_day(&self, device_id: &str, fiscal_day_no: u32) -> EngineResult<()> {
        validate_device_id(device_id)?;
        let receipts = self.store.list_receipts(device_id, fiscal_day_no).await?;
        verify_day_chain(&receipts)?;

        for receipt in &receipts {
            let canonical = receipt_string(&ReceiptFields {
                device_id: &receipt.device_id,
                receipt_type: receipt.receipt_type,
                currency: &receipt.currency,
                global_no: receipt.global_no,
                receipt_date: receipt.receipt_date,
                total: receipt.total,
                taxes: &receipt.taxes,
                previous_hash: receipt.previous_hash.as_deref(),
            });
            if document_hash(&canonical) != receipt.signature.hash {
                return Err(CoreError::BrokenChain {
                    counter: receipt.counter,
                    reason: "stored hash does not match receipt contents".to_string(),
                }
                .into());
            }
        }

        debug!(device_id = %device_id, fiscal_day_no, receipts = receipts.len(), "Fiscal day audited");
        Ok(())
    }

    async fn require_open_day(&self, device_id: &str) -> EngineResult<FiscalDay> {
        self.store
            .open_fiscal_day(device_id)
            .await?
            .ok_or_else(|| {
                CoreError::NoOpenFiscalDay {
                    device_id: device_id.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Debug for FiscalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiscalService")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .field("locks", &self.locks)
            .finish()
    }
}

// =============================================================================
// Pending Receipt
// =============================================================================

/// A signed receipt that has not been recorded yet.
///
/// Holds the device lock: no other receipt for the device can be numbered
/// until this one is committed or dropped. Dropping it records nothing, so
/// the next receipt reuses the same numbers.
pub struct PendingReceipt {
    payload: SubmitReceiptSigningPayload,
    store: Arc<dyn FiscalStore>,
    guard: DeviceGuard,
}

impl PendingReceipt {
    pub fn payload(&self) -> &SubmitReceiptSigningPayload {
        &self.payload
    }

    pub fn receipt(&self) -> &Receipt {
        &self.payload.receipt
    }

    /// Records the receipt, making it the device's chain head, then
    /// releases the device lock.
    pub async fn commit(self, authority_receipt_id: Option<u64>) -> EngineResult<SubmitReceiptSigningPayload> {
        let PendingReceipt {
            mut payload,
            store,
            guard,
        } = self;

        payload.receipt.authority_receipt_id = authority_receipt_id;
        store.insert_receipt(&payload.receipt).await?;

        info!(
            device_id = %payload.receipt.device_id,
            invoice_no = %payload.receipt.invoice_no,
            global_no = payload.receipt.global_no,
            counter = payload.receipt.counter,
            "Receipt recorded"
        );

        drop(guard);
        Ok(payload)
    }
}

impl fmt::Debug for PendingReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReceipt")
            .field("device_id", &self.payload.receipt.device_id)
            .field("invoice_no", &self.payload.receipt.invoice_no)
            .field("global_no", &self.payload.receipt.global_no)
            .finish()
    }
}
