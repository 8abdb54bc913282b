//! Configuration management
//!
//! settings.json format shared with the app shell:
//! ```json
//! {
//!   "app": { "demoMode": false, "userId": "demo-user", "corridor": "USD-SLL" },
//!   "provider": { "baseUrl": "...", "tokenUrl": "...", "feePct": 0.01 },
//!   "sync": { "batchLimit": 10, "maxRetries": 10 }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::cybrid::CybridConfig;
use crate::services::SyncConfig;

/// Raw settings.json structure (matching the app shell format)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    provider: ProviderSettings,
    #[serde(default)]
    sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(default = "default_user_id")]
    user_id: String,
    #[serde(default = "default_corridor")]
    corridor: String,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            demo_mode: false,
            user_id: default_user_id(),
            corridor: default_corridor(),
            other: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderSettings {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default)]
    token_url: String,
    #[serde(default = "default_fee_pct")]
    fee_pct: f64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_url: String::new(),
            fee_pct: default_fee_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncSettings {
    #[serde(default = "default_batch_limit")]
    batch_limit: usize,
    #[serde(default = "default_max_retries")]
    max_retries: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_user_id() -> String {
    "demo-user".to_string()
}

fn default_corridor() -> String {
    "USD-SLL".to_string()
}

fn default_base_url() -> String {
    "https://bank.production.cybrid.app".to_string()
}

fn default_fee_pct() -> f64 {
    0.01
}

fn default_batch_limit() -> usize {
    10
}

fn default_max_retries() -> i64 {
    10
}

/// Remit configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub demo_mode: bool,
    pub user_id: String,
    pub corridor: String,
    pub provider_base_url: String,
    pub provider_token_url: String,
    pub fee_pct: Decimal,
    pub sync_batch_limit: usize,
    pub sync_max_retries: i64,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_raw(SettingsFile::default(), None)
    }
}

impl Config {
    /// Load config from the remit directory
    ///
    /// Demo mode can be enabled via:
    /// 1. Settings file
    /// 2. Environment variable REMIT_DEMO_MODE (for CI/testing)
    pub fn load(remit_dir: &Path) -> Result<Self> {
        let settings_path = remit_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let demo_override = match std::env::var("REMIT_DEMO_MODE").ok().as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => Some(true),
            Some("false" | "0" | "no" | "FALSE" | "NO") => Some(false),
            _ => None,
        };

        Ok(Self::from_raw(raw, demo_override))
    }

    fn from_raw(raw: SettingsFile, demo_override: Option<bool>) -> Self {
        Self {
            demo_mode: demo_override.unwrap_or(raw.app.demo_mode),
            user_id: raw.app.user_id.clone(),
            corridor: raw.app.corridor.clone(),
            provider_base_url: raw.provider.base_url.clone(),
            provider_token_url: raw.provider.token_url.clone(),
            fee_pct: Decimal::try_from(raw.provider.fee_pct)
                .unwrap_or_else(|_| Decimal::new(1, 2)),
            sync_batch_limit: raw.sync.batch_limit,
            sync_max_retries: raw.sync.max_retries,
            _raw_settings: raw,
        }
    }

    /// Save config to the remit directory, preserving settings the core
    /// doesn't manage
    pub fn save(&self, remit_dir: &Path) -> Result<()> {
        let settings_path = remit_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.app.demo_mode = self.demo_mode;
        settings.app.user_id = self.user_id.clone();
        settings.app.corridor = self.corridor.clone();
        settings.provider.base_url = self.provider_base_url.clone();
        settings.provider.token_url = self.provider_token_url.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Provider configuration for the Cybrid adapter
    pub fn cybrid_config(&self) -> CybridConfig {
        CybridConfig {
            base_url: self.provider_base_url.clone(),
            token_url: self.provider_token_url.clone(),
            corridor: self.corridor.clone(),
            fee_pct: self.fee_pct,
        }
    }

    /// Drain configuration for the sync dispatcher
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_batch_limit(self.sync_batch_limit)
            .with_max_retries(self.sync_max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert!(!config.demo_mode || std::env::var("REMIT_DEMO_MODE").is_ok());
        assert_eq!(config.corridor, "USD-SLL");
        assert_eq!(config.sync_batch_limit, 10);
        assert_eq!(config.sync_max_retries, 10);
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(dir.path()).unwrap();
        config.demo_mode = true;
        config.corridor = "USD-KES".to_string();
        config.save(dir.path()).unwrap();

        let reloaded = Config::load(dir.path()).unwrap();
        assert_eq!(reloaded.corridor, "USD-KES");
    }

    #[test]
    fn test_unmanaged_app_settings_survive_save() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"app": {"demoMode": true, "theme": "dark"}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        assert!(content.contains("theme"));
    }
}
