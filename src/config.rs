use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};

const CONFIG_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc.sepolia.org".to_string(),
            chain_id: 11_155_111,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionConfig {
    pub default_gas_limit: u64,
    pub default_gas_price_gwei: u64,
    pub max_gas_price_gwei: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            default_gas_limit: 21_000,
            default_gas_price_gwei: 1,
            max_gas_price_gwei: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcConfig {
    pub timeout_secs: u64,
    /// Retries after the first attempt; a call makes at most
    /// `max_retries + 1` attempts.
    pub max_retries: u32,
    pub min_request_interval_ms: u64,
    /// Base for exponential backoff on rate-limit responses.
    pub rate_limit_backoff_base_ms: u64,
    /// Fixed backoff on timeouts and transport failures.
    pub fixed_backoff_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 2,
            min_request_interval_ms: 500,
            rate_limit_backoff_base_ms: 500,
            fixed_backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api-sepolia.etherscan.io/api".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    pub transaction: TransactionConfig,
    pub rpc: RpcConfig,
    pub explorer: ExplorerConfig,
    /// Mirror of the default-wallet pointer; the pointer file is
    /// authoritative.
    #[serde(default)]
    pub default_wallet: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            transaction: TransactionConfig::default(),
            rpc: RpcConfig::default(),
            explorer: ExplorerConfig::default(),
            default_wallet: None,
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }
}

impl WalletConfig {
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: WalletConfig,
}

/// Handles persistence of wallet configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            let config = WalletConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        if checksum(&envelope.payload) != envelope.checksum {
            return Err(WalletError::ValidationError(
                "Config integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.payload)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload),
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    pub fn update<F>(&self, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default()?;
        updater(&mut config)?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &WalletConfig) -> [u8; 32] {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(config).expect("config serialization must succeed");
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_config_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wallet.config");
        let store = ConfigStore::new(&path);

        let mut config = WalletConfig::default();
        config.network.rpc_url = "http://localhost:8545".into();
        config.transaction.max_gas_price_gwei = 250;
        store.save(&config).unwrap();

        let loaded = store.load_or_default().unwrap();
        assert_eq!(loaded.network.rpc_url, "http://localhost:8545");
        assert_eq!(loaded.transaction.max_gas_price_gwei, 250);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("wallet.config"));
        let config = store.load_or_default().unwrap();
        assert_eq!(config.network.chain_id, 11_155_111);
        assert_eq!(config.transaction.default_gas_limit, 21_000);
        assert!(config.default_wallet.is_none());
    }

    #[test]
    fn update_persists_default_wallet_mirror() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("wallet.config"));

        store
            .update(|config| {
                config.default_wallet =
                    Some("0x1234567890123456789012345678901234567890".to_string());
                Ok(())
            })
            .unwrap();

        let loaded = store.load_or_default().unwrap();
        assert_eq!(
            loaded.default_wallet.as_deref(),
            Some("0x1234567890123456789012345678901234567890")
        );
    }

    #[test]
    fn tampered_config_detected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wallet.config");
        let store = ConfigStore::new(&path);
        store.save(&WalletConfig::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let tampered = content.replace("11155111", "11155112");
        assert_ne!(content, tampered);
        fs::write(&path, tampered).unwrap();

        let result = store.load_or_default();
        assert!(matches!(result, Err(WalletError::ValidationError(_))));
    }
}
