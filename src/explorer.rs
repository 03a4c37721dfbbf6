//! Transaction history via an etherscan-compatible explorer API, with
//! JSON export.
//!
//! The explorer is a convenience surface only; nothing in the transfer
//! pipeline depends on it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::ExplorerConfig;
use crate::errors::{WalletError, WalletResult};
use crate::retry::{with_retries, RetryDecision};
use crate::units;
use crate::validation::InputValidator;

/// One confirmed transaction touching the queried address.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value_wei: u128,
    /// Display value; `value_wei` is authoritative.
    pub value_ether: f64,
    pub gas_used: u64,
    pub gas_price_gwei: f64,
    pub block_number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

// Etherscan serializes every field as a decimal string.
#[derive(Debug, Deserialize)]
struct RawEntry {
    hash: String,
    from: String,
    to: String,
    value: String,
    #[serde(rename = "gasUsed")]
    gas_used: String,
    #[serde(rename = "gasPrice")]
    gas_price: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "timeStamp")]
    timestamp: String,
}

pub struct ExplorerClient {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    export_dir: PathBuf,
    validator: InputValidator,
}

const EXPLORER_ATTEMPTS_AFTER_FIRST: u32 = 2;
const EXPLORER_BACKOFF: Duration = Duration::from_millis(1_000);

impl ExplorerClient {
    /// Build a client; absent API key is rejected up front rather than on
    /// first query.
    pub fn new(config: &ExplorerConfig, export_dir: impl AsRef<Path>) -> WalletResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            WalletError::ValidationError("Explorer API key is not configured".to_string())
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            export_dir: export_dir.as_ref().to_path_buf(),
            validator: InputValidator::new()?,
        })
    }

    /// Most recent transactions for an address, newest first, at most
    /// `limit` entries.
    pub fn history(&self, address: &str, limit: usize) -> WalletResult<Vec<HistoryEntry>> {
        self.validator.validate_address(address)?;

        let body = with_retries(
            EXPLORER_ATTEMPTS_AFTER_FIRST,
            || self.fetch(address, limit),
            |error, _| match error {
                WalletError::NetworkError(_) => RetryDecision::Retry(EXPLORER_BACKOFF),
                _ => RetryDecision::Fatal,
            },
        )?;
        parse_history(&body)
    }

    fn fetch(&self, address: &str, limit: usize) -> WalletResult<String> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("startblock", "0"),
                ("endblock", "99999999"),
                ("page", "1"),
                ("offset", &limit.to_string()),
                ("sort", "desc"),
                ("apikey", &self.api_key),
            ])
            .send()
            .map_err(|e| WalletError::NetworkError(format!("Explorer request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WalletError::NetworkError(format!(
                "Explorer HTTP error: {}",
                response.status()
            )));
        }
        response
            .text()
            .map_err(|e| WalletError::NetworkError(format!("Explorer response unreadable: {}", e)))
    }

    /// Export history entries as pretty-printed JSON under the export
    /// directory; returns the written path.
    pub fn export_history(
        &self,
        address: &str,
        entries: &[HistoryEntry],
    ) -> WalletResult<PathBuf> {
        self.validator.validate_address(address)?;
        fs::create_dir_all(&self.export_dir)?;

        let filename = format!(
            "history_{}_{}.json",
            address,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        let path = self.export_dir.join(filename);
        let serialized = serde_json::to_vec_pretty(entries)?;
        let mut file = File::create(&path)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        log::info!("Exported {} history entries to {}", entries.len(), path.display());
        Ok(path)
    }
}

fn parse_history(body: &str) -> WalletResult<Vec<HistoryEntry>> {
    let response: ExplorerResponse = serde_json::from_str(body)
        .map_err(|e| WalletError::NetworkError(format!("Invalid explorer response: {}", e)))?;

    if response.status != "1" {
        // An empty result set is reported through the same status flag as
        // real failures.
        if response.message.contains("No transactions found") {
            return Ok(Vec::new());
        }
        return Err(WalletError::RpcError(format!(
            "Explorer error: {}",
            response.message
        )));
    }

    let raw: Vec<RawEntry> = serde_json::from_value(response.result)
        .map_err(|e| WalletError::NetworkError(format!("Invalid explorer result: {}", e)))?;

    raw.into_iter()
        .map(|entry| {
            let value_wei = parse_decimal_u128(&entry.value)?;
            let gas_price_wei = parse_decimal_u128(&entry.gas_price)?;
            Ok(HistoryEntry {
                hash: entry.hash,
                from: entry.from,
                to: entry.to,
                value_wei,
                value_ether: units::wei_to_ether_display(value_wei),
                gas_used: parse_decimal_u64(&entry.gas_used)?,
                gas_price_gwei: units::wei_to_gwei_display(gas_price_wei),
                block_number: parse_decimal_u64(&entry.block_number)?,
                timestamp: parse_decimal_u64(&entry.timestamp)?,
            })
        })
        .collect()
}

fn parse_decimal_u128(text: &str) -> WalletResult<u128> {
    text.parse()
        .map_err(|_| WalletError::NetworkError(format!("Invalid decimal in explorer data: {}", text)))
}

fn parse_decimal_u64(text: &str) -> WalletResult<u64> {
    text.parse()
        .map_err(|_| WalletError::NetworkError(format!("Invalid decimal in explorer data: {}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "status": "1",
        "message": "OK",
        "result": [{
            "hash": "0xabc",
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0x2222222222222222222222222222222222222222",
            "value": "1500000000000000000",
            "gasUsed": "21000",
            "gasPrice": "2000000000",
            "blockNumber": "4000000",
            "timeStamp": "1700000000"
        }]
    }"#;

    #[test]
    fn parses_explorer_entries() {
        let entries = parse_history(SAMPLE).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.value_wei, 1_500_000_000_000_000_000);
        assert_eq!(entry.value_ether, 1.5);
        assert_eq!(entry.gas_used, 21_000);
        assert_eq!(entry.gas_price_gwei, 2.0);
        assert_eq!(entry.block_number, 4_000_000);
    }

    #[test]
    fn empty_history_is_not_an_error() {
        let body = r#"{"status":"0","message":"No transactions found","result":[]}"#;
        assert_eq!(parse_history(body).unwrap().len(), 0);
    }

    #[test]
    fn explorer_error_status_raises() {
        let body = r#"{"status":"0","message":"Invalid API Key","result":[]}"#;
        assert!(matches!(
            parse_history(body),
            Err(WalletError::RpcError(_))
        ));
    }

    #[test]
    fn missing_api_key_rejected_at_construction() {
        let config = ExplorerConfig::default();
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ExplorerClient::new(&config, dir.path()),
            Err(WalletError::ValidationError(_))
        ));
    }

    #[test]
    fn export_writes_pretty_json() {
        let mut config = ExplorerConfig::default();
        config.api_key = Some("test-key".to_string());
        let dir = TempDir::new().unwrap();
        let client = ExplorerClient::new(&config, dir.path()).unwrap();

        let entries = parse_history(SAMPLE).unwrap();
        let path = client
            .export_history("0x1111111111111111111111111111111111111111", &entries)
            .unwrap();
        assert!(path.exists());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"hash\": \"0xabc\""));
    }
}
