use crate::errors::{WalletError, WalletResult};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Input validation utilities for the wallet
pub struct InputValidator {
    // Compiled regex patterns for performance
    address_pattern: Regex,
    private_key_pattern: Regex,
    tx_hash_pattern: Regex,
    amount_pattern: Regex,
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        let address_pattern = Regex::new(r"^0x[a-fA-F0-9]{40}$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid address regex: {}", e)))?;

        let private_key_pattern = Regex::new(r"^[a-fA-F0-9]{64}$").map_err(|e| {
            WalletError::ValidationError(format!("Invalid private key regex: {}", e))
        })?;

        let tx_hash_pattern = Regex::new(r"^0x[a-fA-F0-9]{64}$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid tx hash regex: {}", e)))?;

        let amount_pattern = Regex::new(r"^\d*(\.\d{1,18})?$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid amount regex: {}", e)))?;

        Ok(InputValidator {
            address_pattern,
            private_key_pattern,
            tx_hash_pattern,
            amount_pattern,
        })
    }

    /// Validate a 20-byte hex Ethereum address (`0x` + 40 hex chars).
    pub fn validate_address(&self, address: &str) -> WalletResult<()> {
        if !self.address_pattern.is_match(address) {
            return Err(WalletError::InvalidAddress(format!(
                "Address format is invalid: {}",
                address
            )));
        }
        Ok(())
    }

    pub fn is_valid_address(&self, address: &str) -> bool {
        self.address_pattern.is_match(address)
    }

    /// Validate a raw private key: exactly 64 hex characters, no `0x`
    /// prefix.
    pub fn validate_private_key(&self, private_key_hex: &str) -> WalletResult<()> {
        if !self.private_key_pattern.is_match(private_key_hex) {
            return Err(WalletError::InvalidKey(
                "Private key must be 64 hexadecimal characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a transaction hash (`0x` + 64 hex chars).
    pub fn validate_tx_hash(&self, tx_hash: &str) -> WalletResult<()> {
        if !self.tx_hash_pattern.is_match(tx_hash) {
            return Err(WalletError::ValidationError(format!(
                "Invalid transaction hash: {}",
                tx_hash
            )));
        }
        Ok(())
    }

    /// Validate an ether amount string: unsigned decimal, strictly positive.
    pub fn validate_amount(&self, amount: &str) -> WalletResult<()> {
        let amount = amount.trim();
        if amount.is_empty() || amount == "." || !self.amount_pattern.is_match(amount) {
            return Err(WalletError::InvalidAmount(format!(
                "Amount format is invalid: {}",
                amount
            )));
        }
        if amount.chars().all(|c| c == '0' || c == '.') {
            return Err(WalletError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate password strength.
    pub fn validate_password(&self, password: &SecretString) -> WalletResult<()> {
        if password.expose_secret().len() < MIN_PASSWORD_LEN {
            return Err(WalletError::ValidationError(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new().expect("Failed to create InputValidator")
    }
}

/// Decode a validated `0x`-prefixed address into its 20 raw bytes.
pub fn address_to_bytes(address: &str) -> WalletResult<[u8; 20]> {
    let stripped = address
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::InvalidAddress(format!("Missing 0x prefix: {}", address)))?;
    let bytes = hex::decode(stripped)
        .map_err(|_| WalletError::InvalidAddress(format!("Address is not hex: {}", address)))?;
    bytes
        .try_into()
        .map_err(|_| WalletError::InvalidAddress(format!("Address is not 20 bytes: {}", address)))
}
