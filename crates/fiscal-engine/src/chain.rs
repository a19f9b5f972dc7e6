//! # Receipt Chain Tracker
//!
//! Reads a device's chain head from storage and hands out the numbering for
//! the next receipt. Callers hold the device lock between asking and
//! recording, otherwise two receipts can be given the same numbers.

use fiscal_core::chain::{ChainPosition, ChainState};
use fiscal_core::{FiscalDay, Receipt};

use crate::error::EngineResult;
use crate::store::FiscalStore;

pub struct ReceiptChainTracker<'a> {
    store: &'a dyn FiscalStore,
}

impl<'a> ReceiptChainTracker<'a> {
    pub fn new(store: &'a dyn FiscalStore) -> Self {
        ReceiptChainTracker { store }
    }

    /// Chain state as seen from the given open fiscal day.
    ///
    /// The device's last receipt decides everything: it carries the
    /// highest global number, and when it belongs to the open day it is
    /// also that day's last receipt.
    pub async fn state(&self, open_day: &FiscalDay) -> EngineResult<ChainState> {
        let last = self.store.last_receipt(&open_day.device_id).await?;
        Ok(state_from_last(last.as_ref(), open_day))
    }

    pub async fn position(&self, open_day: &FiscalDay) -> EngineResult<ChainPosition> {
        Ok(self.state(open_day).await?.next_position())
    }

    /// Position of the next receipt within the open day, starting at 1.
    pub async fn next_counter(&self, open_day: &FiscalDay) -> EngineResult<u32> {
        Ok(self.position(open_day).await?.counter)
    }

    /// Last global number + 1, or 1 for a device's first receipt.
    pub async fn next_global_number(&self, device_id: &str) -> EngineResult<u64> {
        let last = self.store.last_receipt(device_id).await?;
        Ok(last.map_or(1, |r| r.global_no + 1))
    }

    /// Hash the next receipt of the open day chains onto, if any.
    pub async fn previous_hash(&self, open_day: &FiscalDay) -> EngineResult<Option<String>> {
        Ok(self.position(open_day).await?.previous_hash)
    }
}

fn state_from_last(last: Option<&Receipt>, open_day: &FiscalDay) -> ChainState {
    match last {
        None => ChainState::default(),
        Some(receipt) if receipt.fiscal_day_no == open_day.day_no => ChainState {
            receipts_in_day: receipt.counter,
            last_hash_in_day: Some(receipt.signature.hash.clone()),
            last_global_no: Some(receipt.global_no),
        },
        Some(receipt) => ChainState {
            receipts_in_day: 0,
            last_hash_in_day: None,
            last_global_no: Some(receipt.global_no),
        },
    }
}
