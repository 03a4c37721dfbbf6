//! Wallet lifecycle: generation, import, inspection, and the default
//! wallet pointer.
//!
//! Private keys exist in memory only inside [`zeroize::Zeroizing`] buffers
//! and on disk only inside encrypted record blobs. No operation here ever
//! returns or logs raw key material.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::config::ConfigStore;
use crate::crypto;
use crate::errors::{WalletError, WalletResult};
use crate::rpc::{BalanceBreakdown, RpcGateway};
use crate::storage::{DefaultPointer, FsRecordStore, RecordStore, WalletPaths, WalletRecord};
use crate::validation::InputValidator;

/// Wallet listing entry; no key material.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub imported: bool,
    pub is_default: bool,
}

/// Detailed wallet view combining stored metadata with live balance.
#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub imported: bool,
    pub balance: BalanceBreakdown,
    /// True when a password was supplied and decrypted successfully.
    pub private_key_available: bool,
    /// Raw private key hex, attached only on successful decryption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Set instead of raising when the supplied password was wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decryption_error: Option<String>,
}

/// Manages wallet records under a single data directory.
pub struct WalletManager {
    store: Box<dyn RecordStore>,
    pointer: DefaultPointer,
    config_store: ConfigStore,
    validator: InputValidator,
}

impl WalletManager {
    pub fn new(paths: &WalletPaths) -> WalletResult<Self> {
        paths.ensure_directories()?;
        Ok(Self {
            store: Box::new(FsRecordStore::new(paths)),
            pointer: DefaultPointer::new(paths),
            config_store: ConfigStore::new(paths.config_file()),
            validator: InputValidator::new()?,
        })
    }

    /// Create a wallet with a freshly generated private key. Returns the
    /// derived address. The first wallet created becomes the default.
    pub fn generate(&self, password: &SecretString) -> WalletResult<String> {
        self.validator.validate_password(password)?;

        let private_key = crypto::generate_private_key();
        let address = crypto::derive_address(&private_key)?;
        self.persist(&private_key, &address, password, false)?;
        log::info!("Generated wallet {}", address);
        Ok(address)
    }

    /// Import an existing private key. Re-importing a key whose address is
    /// already stored is rejected rather than overwritten.
    pub fn import(&self, private_key_hex: &str, password: &SecretString) -> WalletResult<String> {
        self.validator.validate_password(password)?;
        self.validator.validate_private_key(private_key_hex)?;

        let private_key = crypto::parse_private_key(private_key_hex)?;
        let address = crypto::derive_address(&private_key)?;
        if self.store.contains(&address) {
            return Err(WalletError::AlreadyExists(format!(
                "Wallet already exists: {}",
                address
            )));
        }
        self.persist(&private_key, &address, password, true)?;
        log::info!("Imported wallet {}", address);
        Ok(address)
    }

    fn persist(
        &self,
        private_key: &Zeroizing<[u8; 32]>,
        address: &str,
        password: &SecretString,
        imported: bool,
    ) -> WalletResult<()> {
        let encrypted = crypto::encrypt_private_key(private_key, password)?;
        let record = WalletRecord {
            address: address.to_string(),
            salt: hex::encode(encrypted.salt),
            encrypted_private_key: hex::encode(&encrypted.blob),
            created_at: Utc::now(),
            imported,
            kdf_version: crypto::KDF_VERSION,
        };
        self.store.put(address, &record)?;

        if self.pointer.read()?.is_none() {
            self.set_default(address)?;
        }
        Ok(())
    }

    /// Decrypt the stored private key for an address.
    pub fn decrypt_key(
        &self,
        address: &str,
        password: &SecretString,
    ) -> WalletResult<Zeroizing<[u8; 32]>> {
        let record = self.store.get(address)?;
        // A record with unparseable hex is as unusable as a wrong
        // password; both collapse to the same error.
        let salt = hex::decode(&record.salt).map_err(|_| WalletError::DecryptionError)?;
        let blob = hex::decode(&record.encrypted_private_key)
            .map_err(|_| WalletError::DecryptionError)?;
        crypto::decrypt_private_key(&salt, &blob, password)
    }

    /// Stored metadata plus live balance for one wallet.
    ///
    /// When a password is supplied, decryption is attempted; success
    /// attaches the raw key hex, a wrong password is reported in the
    /// result rather than raised, so balance inspection still works.
    pub fn wallet_info(
        &self,
        address: &str,
        password: Option<&SecretString>,
        rpc: &RpcGateway,
    ) -> WalletResult<WalletInfo> {
        let record = self.store.get(address)?;
        let balance = rpc.get_balance(address)?;

        let (private_key, decryption_error) = match password {
            None => (None, None),
            Some(password) => match self.decrypt_key(address, password) {
                Ok(key) => (Some(hex::encode(key.as_ref())), None),
                Err(e) => (None, Some(e.to_string())),
            },
        };

        Ok(WalletInfo {
            address: record.address,
            created_at: record.created_at,
            imported: record.imported,
            balance,
            private_key_available: private_key.is_some(),
            private_key,
            decryption_error,
        })
    }

    /// All stored wallets, newest first.
    pub fn list(&self) -> WalletResult<Vec<WalletSummary>> {
        let default = self.pointer.read()?;
        let mut records = self.store.list()?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records
            .into_iter()
            .map(|record| WalletSummary {
                is_default: default.as_deref() == Some(record.address.as_str()),
                address: record.address,
                created_at: record.created_at,
                imported: record.imported,
            })
            .collect())
    }

    /// Point the default-wallet marker at a stored address. The pointer
    /// file is authoritative; the config mirror is best effort.
    pub fn set_default(&self, address: &str) -> WalletResult<()> {
        self.validator.validate_address(address)?;
        if !self.store.contains(address) {
            return Err(WalletError::NotFound(format!(
                "No wallet record for {}",
                address
            )));
        }
        self.pointer.write(address)?;
        self.config_store.update(|config| {
            config.default_wallet = Some(address.to_string());
            Ok(())
        })?;
        Ok(())
    }

    /// Resolve the default wallet address, verifying its record still
    /// exists.
    pub fn default_wallet(&self) -> WalletResult<String> {
        let address = self
            .pointer
            .read()?
            .ok_or_else(|| WalletError::NotFound("No default wallet set".to_string()))?;
        if !self.store.contains(&address) {
            return Err(WalletError::NotFound(format!(
                "Default wallet record is missing: {}",
                address
            )));
        }
        Ok(address)
    }
}
