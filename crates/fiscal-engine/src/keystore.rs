//! # Device Key Store
//!
//! Loads each device's private key from `{key_dir}/{device_id}.key` on first
//! use and caches the parsed signer for the life of the process. Key files
//! are read-only; nothing here ever writes them.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use fiscal_core::signature::SignatureEngine;
use fiscal_core::validation::validate_device_id;
use fiscal_core::CoreError;

use crate::error::{EngineError, EngineResult};

pub struct KeyStore {
    key_dir: PathBuf,
    cache: DashMap<String, Arc<SignatureEngine>>,
}

impl KeyStore {
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        KeyStore {
            key_dir: key_dir.into(),
            cache: DashMap::new(),
        }
    }

    /// `{key_dir}/{device_id}.key`. The id must be a valid device id and the
    /// resulting file must sit directly inside `key_dir`.
    pub fn key_path(&self, device_id: &str) -> EngineResult<PathBuf> {
        validate_device_id(device_id)?;

        let path = self.key_dir.join(format!("{}.key", device_id));
        if path.parent() != Some(self.key_dir.as_path()) {
            return Err(key_error(
                device_id,
                &path,
                "key file would lie outside the key directory".to_string(),
            ));
        }
        Ok(path)
    }

    /// The device's signer, loading it from disk on first use.
    ///
    /// ## Errors
    /// `KeyStore` naming the device and path when the file is missing,
    /// unreadable or not a usable RSA key. The key text is never included.
    pub async fn signer(&self, device_id: &str) -> EngineResult<Arc<SignatureEngine>> {
        if let Some(engine) = self.cache.get(device_id) {
            return Ok(Arc::clone(engine.value()));
        }

        let path = self.key_path(device_id)?;
        debug!(device_id = %device_id, path = %path.display(), "Loading device key");

        let pem = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| key_error(device_id, &path, e.to_string()))?;

        let engine = SignatureEngine::from_pem(&pem).map_err(|e| match e {
            CoreError::KeyLoad { reason } => key_error(device_id, &path, reason),
            other => EngineError::Core(other),
        })?;

        info!(device_id = %device_id, "Device key loaded");

        // A concurrent first load may have won; either engine is equivalent.
        let engine = self
            .cache
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(engine))
            .clone();

        Ok(engine)
    }

    /// Installs an already-parsed signer, bypassing the key directory.
    pub fn insert(&self, device_id: impl Into<String>, engine: SignatureEngine) {
        self.cache.insert(device_id.into(), Arc::new(engine));
    }

    /// Drops the cached signer so the next use re-reads the key file.
    pub fn evict(&self, device_id: &str) -> bool {
        self.cache.remove(device_id).is_some()
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("key_dir", &self.key_dir)
            .field("cached_devices", &self.cache.len())
            .finish()
    }
}

fn key_error(device_id: &str, path: &Path, reason: String) -> EngineError {
    EngineError::KeyStore {
        device_id: device_id.to_string(),
        path: path.to_path_buf(),
        reason,
    }
}
