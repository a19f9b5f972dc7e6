//! # Per-Device Locks
//!
//! Numbering, signing and recording a receipt must happen as one step per
//! device: receipt N signs over receipt N-1's hash, and two submissions that
//! both read the same chain head would take the same global number.
//!
//! ```text
//!  device 321 ──► Mutex ──► [ read head → number → sign → record ] ──► release
//!  device 322 ──► Mutex ──► [ ... ]      (independent, runs in parallel)
//! ```
//!
//! Guards are owned so a pending receipt can carry its lock across awaits
//! until it is committed or dropped.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Exclusive hold on one device's fiscal state.
pub type DeviceGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct DeviceLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the device. FIFO among waiters.
    pub async fn acquire(&self, device_id: &str) -> DeviceGuard {
        // Clone the Arc out so the map shard is not held while waiting
        let lock = self
            .locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        trace!(device_id = %device_id, "Waiting for device lock");
        lock.lock_owned().await
    }

    pub fn device_count(&self) -> usize {
        self.locks.len()
    }
}
