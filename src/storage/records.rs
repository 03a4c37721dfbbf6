use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::storage::WalletPaths;

/// Persisted wallet record, one JSON file per address.
///
/// Records are immutable after creation: they are only ever written once and
/// read back. There is no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletRecord {
    /// Lowercase `0x` + 40 hex chars; globally unique key.
    pub address: String,
    /// PBKDF2 salt, hex encoded.
    pub salt: String,
    /// `nonce || ciphertext || tag`, hex encoded.
    pub encrypted_private_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub imported: bool,
    /// Encryption-parameter version; lets the format evolve while old
    /// records stay decryptable.
    #[serde(default = "default_kdf_version")]
    pub kdf_version: u16,
}

fn default_kdf_version() -> u16 {
    crate::crypto::KDF_VERSION
}

/// Minimal key-value interface over wallet record persistence, so the
/// backend can be swapped without touching derivation or encryption logic.
pub trait RecordStore {
    fn put(&self, address: &str, record: &WalletRecord) -> WalletResult<()>;
    fn get(&self, address: &str) -> WalletResult<WalletRecord>;
    /// All parseable records; corrupted files are skipped, not surfaced.
    fn list(&self) -> WalletResult<Vec<WalletRecord>>;
    fn contains(&self, address: &str) -> bool;
}

/// Filesystem-backed record store: `<records_dir>/<address>.json`, mode
/// 0600.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    records_dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(paths: &WalletPaths) -> Self {
        Self {
            records_dir: paths.records_dir().to_path_buf(),
        }
    }

    fn record_path(&self, address: &str) -> PathBuf {
        self.records_dir.join(format!("{}.json", address))
    }
}

impl RecordStore for FsRecordStore {
    fn put(&self, address: &str, record: &WalletRecord) -> WalletResult<()> {
        fs::create_dir_all(&self.records_dir)?;
        let path = self.record_path(address);
        let serialized = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, &serialized)?;
        Ok(())
    }

    fn get(&self, address: &str) -> WalletResult<WalletRecord> {
        let path = self.record_path(address);
        if !path.exists() {
            return Err(WalletError::NotFound(format!(
                "No wallet record for {}",
                address
            )));
        }
        let bytes = fs::read(&path)?;
        let record = serde_json::from_slice(&bytes)?;
        Ok(record)
    }

    fn list(&self) -> WalletResult<Vec<WalletRecord>> {
        if !self.records_dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&self.records_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<WalletRecord>(&bytes).ok())
            {
                Some(record) => records.push(record),
                None => {
                    log::warn!("Skipping unreadable wallet record: {}", path.display());
                }
            }
        }
        Ok(records)
    }

    fn contains(&self, address: &str) -> bool {
        self.record_path(address).exists()
    }
}

/// The persisted default-wallet pointer: a single address, overwritten
/// wholesale.
#[derive(Debug, Clone)]
pub struct DefaultPointer {
    path: PathBuf,
}

impl DefaultPointer {
    pub fn new(paths: &WalletPaths) -> Self {
        Self {
            path: paths.default_file().to_path_buf(),
        }
    }

    pub fn read(&self) -> WalletResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let address = content.trim();
        if address.is_empty() {
            Ok(None)
        } else {
            Ok(Some(address.to_string()))
        }
    }

    pub fn write(&self, address: &str) -> WalletResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, address.as_bytes())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> WalletResult<()> {
    let tmp_path = path.with_extension("new");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
