//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FISCAL_ENVIRONMENT=production                                      │
//! │     FISCAL_KEY_DIR=/etc/fiscal/keys                                    │
//! │     FISCAL_QR_URL / FISCAL_API_URL / FISCAL_QR_FORMAT                  │
//! │     FISCAL_CURRENCIES=ZWG,USD                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fiscal-gateway/fiscal.toml (Linux)                       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     test environment, path-style QR, ZWG + USD                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [authority]
//! environment = "test"          # test | production
//! qr_format = "path"            # path | query
//! # api_base_url = "https://fdmsapitest.zimra.co.zw/Device/v1/"
//! # qr_base_url = "https://fdmstest.zimra.co.zw/"
//!
//! [counters]
//! currencies = ["ZWG", "USD"]
//! tax_codes = ["A", "B", "C", "D"]
//!
//! [keys]
//! key_dir = "/etc/fiscal/keys"  # {key_dir}/{device_id}.key
//! ```
//!
//! The loaded value is passed explicitly to everything that depends on the
//! environment. Nothing reads a process-wide setting at call time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use fiscal_core::counters::CounterFilter;
use fiscal_core::qr::{QrCodeEncoder, QrFormat};
use fiscal_core::tax::{Environment, TaxCodeResolver};
use fiscal_core::{FiscalCounterType, TaxCode};

use crate::error::{EngineError, EngineResult};

const TEST_API_URL: &str = "https://fdmsapitest.zimra.co.zw/Device/v1/";
const TEST_QR_URL: &str = "https://fdmstest.zimra.co.zw/";
const PRODUCTION_API_URL: &str = "https://fdmsapi.zimra.co.zw/Device/v1/";
const PRODUCTION_QR_URL: &str = "https://fdms.zimra.co.zw/";

// =============================================================================
// Authority Settings
// =============================================================================

/// Which authority environment to talk to and how receipts link back to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritySettings {
    #[serde(default)]
    pub environment: Environment,

    /// Overrides the environment's device API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Overrides the environment's QR verification base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_base_url: Option<String>,

    /// One QR layout per deployment.
    #[serde(default)]
    pub qr_format: QrFormat,
}

// =============================================================================
// Counter Settings
// =============================================================================

/// Whitelists for fiscal counter aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSettings {
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,

    #[serde(default = "default_counter_types")]
    pub counter_types: Vec<FiscalCounterType>,

    /// Configured tax brackets.
    #[serde(default = "default_tax_codes")]
    pub tax_codes: Vec<TaxCode>,
}

fn default_currencies() -> Vec<String> {
    CounterFilter::default().currencies
}

fn default_counter_types() -> Vec<FiscalCounterType> {
    CounterFilter::default().counter_types
}

fn default_tax_codes() -> Vec<TaxCode> {
    CounterFilter::default().tax_codes
}

impl Default for CounterSettings {
    fn default() -> Self {
        CounterSettings {
            currencies: default_currencies(),
            counter_types: default_counter_types(),
            tax_codes: default_tax_codes(),
        }
    }
}

// =============================================================================
// Key Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySettings {
    /// Directory holding one PEM private key per device: `{device_id}.key`.
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,
}

fn default_key_dir() -> PathBuf {
    directories::ProjectDirs::from("zw", "fiscal", "fiscal-gateway")
        .map(|dirs| dirs.data_dir().join("keys"))
        .unwrap_or_else(|| PathBuf::from("./keys"))
}

impl Default for KeySettings {
    fn default() -> Self {
        KeySettings {
            key_dir: default_key_dir(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub authority: AuthoritySettings,

    #[serde(default)]
    pub counters: CounterSettings,

    #[serde(default)]
    pub keys: KeySettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (fiscal.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSave("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.counters.currencies.is_empty() {
            return Err(EngineError::Config(
                "at least one currency must be configured".into(),
            ));
        }
        for currency in &self.counters.currencies {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(EngineError::Config(format!(
                    "currency '{}' is not a 3-letter upper-case code",
                    currency
                )));
            }
        }

        if self.counters.counter_types.is_empty() {
            return Err(EngineError::Config(
                "at least one counter type must be configured".into(),
            ));
        }
        if self.counters.tax_codes.is_empty() {
            return Err(EngineError::Config(
                "at least one tax code must be configured".into(),
            ));
        }

        for (name, url) in [
            ("api_base_url", &self.authority.api_base_url),
            ("qr_base_url", &self.authority.qr_base_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(EngineError::Config(format!(
                        "{} must start with http:// or https://, got: {}",
                        name, url
                    )));
                }
            }
        }

        if self.keys.key_dir.as_os_str().is_empty() {
            return Err(EngineError::Config("key_dir must not be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup("FISCAL_ENVIRONMENT") {
            match env.parse() {
                Ok(parsed) => {
                    debug!(environment = %env, "Overriding environment from environment");
                    self.authority.environment = parsed;
                }
                Err(_) => warn!(environment = %env, "Unknown FISCAL_ENVIRONMENT, ignored"),
            }
        }

        if let Some(dir) = lookup("FISCAL_KEY_DIR") {
            debug!(key_dir = %dir, "Overriding key directory from environment");
            self.keys.key_dir = PathBuf::from(dir);
        }

        if let Some(url) = lookup("FISCAL_QR_URL") {
            self.authority.qr_base_url = Some(url);
        }

        if let Some(url) = lookup("FISCAL_API_URL") {
            self.authority.api_base_url = Some(url);
        }

        if let Some(format) = lookup("FISCAL_QR_FORMAT") {
            match format.parse() {
                Ok(parsed) => self.authority.qr_format = parsed,
                Err(_) => warn!(format = %format, "Unknown FISCAL_QR_FORMAT, ignored"),
            }
        }

        if let Some(list) = lookup("FISCAL_CURRENCIES") {
            self.counters.currencies = list
                .split(',')
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("zw", "fiscal", "fiscal-gateway")
            .map(|dirs| dirs.config_dir().join("fiscal.toml"))
    }

    // =========================================================================
    // Derived Values
    // =========================================================================

    pub fn environment(&self) -> Environment {
        self.authority.environment
    }

    pub fn api_base_url(&self) -> String {
        let base = match (&self.authority.api_base_url, self.authority.environment) {
            (Some(url), _) => url.as_str(),
            (None, Environment::Test) => TEST_API_URL,
            (None, Environment::Production) => PRODUCTION_API_URL,
        };
        with_trailing_slash(base)
    }

    pub fn qr_base_url(&self) -> String {
        let base = match (&self.authority.qr_base_url, self.authority.environment) {
            (Some(url), _) => url.as_str(),
            (None, Environment::Test) => TEST_QR_URL,
            (None, Environment::Production) => PRODUCTION_QR_URL,
        };
        with_trailing_slash(base)
    }

    /// Device endpoint URL, e.g. `.../Device/v1/321/CloseDay`.
    pub fn api_url(&self, device_id: &str, endpoint: &str) -> String {
        format!(
            "{}{}/{}",
            self.api_base_url(),
            device_id,
            endpoint.trim_start_matches('/')
        )
    }

    pub fn resolver(&self) -> TaxCodeResolver {
        TaxCodeResolver::new(self.authority.environment)
    }

    pub fn counter_filter(&self) -> CounterFilter {
        CounterFilter {
            currencies: self.counters.currencies.clone(),
            counter_types: self.counters.counter_types.clone(),
            tax_codes: self.counters.tax_codes.clone(),
        }
    }

    pub fn qr_encoder(&self) -> QrCodeEncoder {
        QrCodeEncoder::new(self.authority.qr_format)
    }

    pub fn key_dir(&self) -> &Path {
        &self.keys.key_dir
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.environment(), Environment::Test);
        assert_eq!(config.authority.qr_format, QrFormat::Path);
        assert_eq!(config.counters.currencies, vec!["ZWG", "USD"]);
        assert_eq!(config.counters.counter_types.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_urls_follow_environment() {
        let mut config = EngineConfig::default();
        assert_eq!(config.qr_base_url(), "https://fdmstest.zimra.co.zw/");
        assert_eq!(
            config.api_url("321", "CloseDay"),
            "https://fdmsapitest.zimra.co.zw/Device/v1/321/CloseDay"
        );

        config.authority.environment = Environment::Production;
        assert_eq!(config.qr_base_url(), "https://fdms.zimra.co.zw/");
        assert_eq!(
            config.api_url("321", "/SubmitReceipt"),
            "https://fdmsapi.zimra.co.zw/Device/v1/321/SubmitReceipt"
        );

        config.authority.qr_base_url = Some("https://qr.example.test".to_string());
        assert_eq!(config.qr_base_url(), "https://qr.example.test/");
    }

    #[test]
    fn test_resolver_follows_environment() {
        let mut config = EngineConfig::default();
        assert_eq!(config.resolver().numeric_id_for(TaxCode::Standard), 3);

        config.authority.environment = Environment::Production;
        assert_eq!(config.resolver().numeric_id_for(TaxCode::Standard), 1);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FISCAL_ENVIRONMENT", "prod"),
            ("FISCAL_KEY_DIR", "/etc/fiscal/keys"),
            ("FISCAL_QR_FORMAT", "query"),
            ("FISCAL_CURRENCIES", "usd, zwg"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(config.key_dir(), Path::new("/etc/fiscal/keys"));
        assert_eq!(config.authority.qr_format, QrFormat::Query);
        assert_eq!(config.counters.currencies, vec!["USD", "ZWG"]);
        assert_eq!(config.counter_filter().currencies, vec!["USD", "ZWG"]);
    }

    #[test]
    fn test_bad_override_is_ignored() {
        let mut config = EngineConfig::default();
        config.apply_overrides(|name| {
            (name == "FISCAL_ENVIRONMENT").then(|| "staging".to_string())
        });
        assert_eq!(config.environment(), Environment::Test);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.counters.currencies = vec!["usd".to_string()];
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        config.counters.currencies = Vec::new();
        assert!(config.validate().is_err());

        config.counters.currencies = vec!["USD".to_string()];
        config.authority.api_base_url = Some("ftp://nope".to_string());
        assert!(config.validate().is_err());

        config.authority.api_base_url = Some("https://fdmsapi.zimra.co.zw/Device/v1".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.api_url("7", "GetStatus"),
            "https://fdmsapi.zimra.co.zw/Device/v1/7/GetStatus"
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
            [authority]
            environment = "production"
            qr_format = "query"

            [counters]
            currencies = ["USD"]
            tax_codes = ["standard", "A"]

            [keys]
            key_dir = "/srv/keys"
        "#;

        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(config.counters.tax_codes, vec![TaxCode::Standard, TaxCode::Exempt]);
        assert_eq!(config.counters.counter_types.len(), 7);

        let saved = toml::to_string_pretty(&config).unwrap();
        assert!(saved.contains("[authority]"));
        assert!(saved.contains("[counters]"));
        let reloaded: EngineConfig = toml::from_str(&saved).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_and_save_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fiscal.toml");

        let mut config = EngineConfig::default();
        config.keys.key_dir = dir.path().join("keys");
        config.save(Some(path.clone())).unwrap();

        let loaded = EngineConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.keys.key_dir, dir.path().join("keys"));
    }
}
