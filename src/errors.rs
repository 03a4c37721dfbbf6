use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletError {
    // Validation errors
    ValidationError(String),
    InvalidAddress(String),
    InvalidAmount(String),
    InvalidKey(String),

    // Cryptographic errors
    /// Wrong password and corrupted ciphertext are intentionally
    /// indistinguishable.
    DecryptionError,
    SignatureVerification(String),

    // Funds
    InsufficientFunds(String),

    // Network errors
    NetworkError(String),
    RpcError(String),
    ChainMismatch { expected: u64, actual: u64 },
    StatusCheck(String),

    // Storage errors
    StorageError(String),
    NotFound(String),
    AlreadyExists(String),
    PermissionDenied(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            WalletError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),

            WalletError::DecryptionError => {
                write!(f, "Invalid password or corrupted wallet data")
            }
            WalletError::SignatureVerification(msg) => {
                write!(f, "Signature verification failed: {}", msg)
            }

            WalletError::InsufficientFunds(msg) => write!(f, "{}", msg),

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::RpcError(msg) => write!(f, "RPC error: {}", msg),
            WalletError::ChainMismatch { expected, actual } => write!(
                f,
                "Wrong network: expected chain id {}, got {}",
                expected, actual
            ),
            WalletError::StatusCheck(msg) => write!(f, "{}", msg),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),
            WalletError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            WalletError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => WalletError::NotFound(error.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                WalletError::PermissionDenied(error.to_string())
            }
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::StorageError(format!("JSON error: {}", error))
    }
}
