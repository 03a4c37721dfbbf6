use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{WalletError, WalletResult};

/// Manages filesystem paths used by the wallet backend.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Root directory for wallet data.
    root_dir: PathBuf,
    /// Directory holding one record file per address.
    records_dir: PathBuf,
    /// File holding the default-wallet pointer.
    default_file: PathBuf,
    /// Directory for exported transaction histories.
    export_dir: PathBuf,
    /// Path to persisted wallet configuration.
    config_file: PathBuf,
}

impl WalletPaths {
    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            records_dir: root_dir.join("wallets"),
            default_file: root_dir.join("default.txt"),
            export_dir: root_dir.join("exports"),
            config_file: root_dir.join("wallet.config"),
            root_dir,
        })
    }

    /// Ensure the directory structure exists, creating missing folders.
    /// The records directory is restricted to the owning user.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        fs::create_dir_all(&self.records_dir)?;
        fs::create_dir_all(&self.export_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.records_dir, fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn default_file(&self) -> &Path {
        &self.default_file
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directory_layout() {
        let dir = TempDir::new().unwrap();
        let paths = WalletPaths::new(dir.path()).unwrap();
        paths.ensure_directories().unwrap();

        assert!(paths.records_dir().is_dir());
        assert!(paths.export_dir().is_dir());
        assert_eq!(paths.config_file(), dir.path().join("wallet.config"));
        assert_eq!(paths.default_file(), dir.path().join("default.txt"));
    }

    #[test]
    fn empty_root_rejected() {
        assert!(matches!(
            WalletPaths::new(""),
            Err(WalletError::StorageError(_))
        ));
    }
}
