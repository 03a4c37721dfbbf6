//! Resilient JSON-RPC gateway to an Ethereum node.
//!
//! One gateway instance owns its transport and its request state: a
//! monotonic request-id counter, a last-dispatch timestamp for the rate
//! limiter, and cumulative call/success counters. All calls are blocking
//! and serialized per instance; callers wanting parallel dispatch must use
//! independent gateways.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::WalletConfig;
use crate::errors::{WalletError, WalletResult};
use crate::retry::{with_retries, Backoff, RetryDecision};
use crate::units;

/// Human names for known chain ids.
pub fn network_name(chain_id: u64) -> &'static str {
    match chain_id {
        11_155_111 => "Sepolia Testnet",
        _ => "Unknown",
    }
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Transport-level failure classification, used to pick a retry policy.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// HTTP 429 equivalent; retried with exponential backoff.
    RateLimited,
    /// Request timed out; retried with fixed backoff.
    Timeout,
    /// Any other transport failure; retried with fixed backoff.
    Transport(String),
}

/// Blocking wire transport for JSON-RPC payloads. The production
/// implementation posts over HTTP; tests script responses through this
/// seam.
pub trait Transport: Send + Sync {
    fn execute(&self, body: &str) -> Result<String, TransportError>;
}

/// HTTP transport over reqwest's blocking client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> WalletResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, body: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Transport(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            return Err(TransportError::Transport(format!("HTTP error: {}", status)));
        }

        response
            .text()
            .map_err(|e| TransportError::Transport(format!("Failed to read response: {}", e)))
    }
}

/// Per-call failure used inside the retry loop.
#[derive(Debug, Clone)]
enum CallError {
    Wire(TransportError),
    /// Response body was not valid JSON-RPC; not a transient condition.
    MalformedBody(String),
    /// Well-formed response carrying a JSON-RPC error; semantic, not
    /// transient.
    Rpc(String),
}

/// Mutable gateway state; lives for the connection lifetime, never reset.
#[derive(Debug, Default)]
struct GatewayState {
    request_id: u64,
    last_request: Option<Instant>,
    call_count: u64,
    success_count: u64,
}

/// Cumulative call statistics.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    /// Percentage, zero when no calls were made.
    pub success_rate: f64,
    pub network: &'static str,
}

/// Balance in all three display units; only `wei` is exact and only `wei`
/// may be used in comparisons.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceBreakdown {
    pub wei: u128,
    pub gwei: f64,
    pub ether: f64,
}

impl BalanceBreakdown {
    pub fn from_wei(wei: u128) -> Self {
        Self {
            wei,
            gwei: units::wei_to_gwei_display(wei),
            ether: units::wei_to_ether_display(wei),
        }
    }
}

/// Observed transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    NotFound,
    Pending,
    Success,
    Failed,
    /// Polling failure; a side observation, not a chain state.
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct TxStatusReport {
    pub status: TxStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
    pub miner: String,
    pub gas_used: u64,
    pub transaction_count: usize,
}

/// Connectivity summary; errors are reported in-band rather than raised.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price_gwei: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct GatewaySettings {
    expected_chain_id: u64,
    max_retries: u32,
    min_request_interval: Duration,
    rate_limit_backoff: Backoff,
    fixed_backoff: Duration,
    default_gas_price_gwei: u64,
}

/// Gateway to a remote Ethereum node.
pub struct RpcGateway {
    transport: Box<dyn Transport>,
    settings: GatewaySettings,
    state: Mutex<GatewayState>,
}

impl std::fmt::Debug for RpcGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcGateway")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RpcGateway {
    /// Connect over HTTP and validate the node's chain id against the
    /// configured one. A mismatch is fatal: it prevents silently operating
    /// against the wrong network.
    pub fn connect(config: &WalletConfig) -> WalletResult<Self> {
        let transport = HttpTransport::new(
            &config.network.rpc_url,
            Duration::from_secs(config.rpc.timeout_secs),
        )?;
        let gateway = Self::with_transport(config, Box::new(transport))?;
        log::info!(
            "Connected to {} (chain id {})",
            config.network.rpc_url,
            config.network.chain_id
        );
        Ok(gateway)
    }

    /// Build a gateway over an arbitrary transport. Performs the same
    /// chain-id validation as [`RpcGateway::connect`].
    pub fn with_transport(
        config: &WalletConfig,
        transport: Box<dyn Transport>,
    ) -> WalletResult<Self> {
        let gateway = Self {
            transport,
            settings: GatewaySettings {
                expected_chain_id: config.network.chain_id,
                max_retries: config.rpc.max_retries,
                min_request_interval: Duration::from_millis(config.rpc.min_request_interval_ms),
                rate_limit_backoff: Backoff::Exponential {
                    base: Duration::from_millis(config.rpc.rate_limit_backoff_base_ms),
                },
                fixed_backoff: Duration::from_millis(config.rpc.fixed_backoff_ms),
                default_gas_price_gwei: config.transaction.default_gas_price_gwei,
            },
            state: Mutex::new(GatewayState::default()),
        };
        gateway.get_chain_id()?;
        Ok(gateway)
    }

    /// Make a JSON-RPC call with rate limiting and retry.
    pub fn call(&self, method: &str, params: Value) -> WalletResult<Value> {
        let id = self.begin_call();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        let body = serde_json::to_string(&request)?;
        log::debug!("Calling {} (id {})", method, id);

        let outcome = with_retries(
            self.settings.max_retries,
            || self.dispatch(&body),
            |error, attempt| match error {
                CallError::Wire(TransportError::RateLimited) => {
                    log::warn!("Rate limited on {}, attempt {}", method, attempt + 1);
                    RetryDecision::Retry(self.settings.rate_limit_backoff.delay(attempt))
                }
                CallError::Wire(TransportError::Timeout)
                | CallError::Wire(TransportError::Transport(_)) => {
                    log::warn!("Transport failure on {}, attempt {}", method, attempt + 1);
                    RetryDecision::Retry(self.settings.fixed_backoff)
                }
                CallError::MalformedBody(_) | CallError::Rpc(_) => RetryDecision::Fatal,
            },
        );

        match outcome {
            Ok(result) => {
                self.state.lock().success_count += 1;
                Ok(result)
            }
            Err(CallError::Wire(TransportError::RateLimited)) => Err(WalletError::NetworkError(
                format!("{}: rate limited after all retries", method),
            )),
            Err(CallError::Wire(TransportError::Timeout)) => Err(WalletError::NetworkError(
                format!("{}: request timed out after all retries", method),
            )),
            Err(CallError::Wire(TransportError::Transport(msg))) => {
                Err(WalletError::NetworkError(msg))
            }
            Err(CallError::MalformedBody(msg)) => Err(WalletError::NetworkError(msg)),
            Err(CallError::Rpc(msg)) => Err(WalletError::RpcError(msg)),
        }
    }

    /// Reserve a request id, bump the call counter, and enforce the
    /// minimum inter-request spacing by sleeping out the remainder.
    fn begin_call(&self) -> u64 {
        let mut state = self.state.lock();
        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.settings.min_request_interval {
                std::thread::sleep(self.settings.min_request_interval - elapsed);
            }
        }
        state.last_request = Some(Instant::now());
        state.call_count += 1;
        state.request_id += 1;
        state.request_id
    }

    fn dispatch(&self, body: &str) -> Result<Value, CallError> {
        let text = self.transport.execute(body).map_err(CallError::Wire)?;
        let response: JsonRpcResponse = serde_json::from_str(&text)
            .map_err(|e| CallError::MalformedBody(format!("Invalid JSON-RPC response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(CallError::Rpc(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        // A well-formed success with `result: null` deserializes to None;
        // represent it as an explicit JSON null for callers.
        Ok(response.result.unwrap_or(Value::Null))
    }

    //  Network information

    /// Fetch the node's chain id and validate it against the expected one.
    pub fn get_chain_id(&self) -> WalletResult<u64> {
        let result = self.call("eth_chainId", json!([]))?;
        let chain_id = quantity_u64(&result)?;
        if chain_id != self.settings.expected_chain_id {
            return Err(WalletError::ChainMismatch {
                expected: self.settings.expected_chain_id,
                actual: chain_id,
            });
        }
        Ok(chain_id)
    }

    /// Basic connectivity summary; never raises.
    pub fn network_info(&self) -> NetworkSummary {
        let probe = || -> WalletResult<NetworkSummary> {
            let chain_id = self.get_chain_id()?;
            let latest_block = self.get_block_number()?;
            let gas_price_wei = self.get_gas_price_wei()?;
            Ok(NetworkSummary {
                connected: true,
                chain_id: Some(chain_id),
                network: Some(network_name(chain_id)),
                latest_block: Some(latest_block),
                gas_price_gwei: Some(units::wei_to_gwei_display(gas_price_wei)),
                error: None,
            })
        };
        probe().unwrap_or_else(|e| NetworkSummary {
            connected: false,
            chain_id: None,
            network: None,
            latest_block: None,
            gas_price_gwei: None,
            error: Some(e.to_string()),
        })
    }

    //  Balance operations

    /// Exact balance in wei at the latest block.
    pub fn get_balance_wei(&self, address: &str) -> WalletResult<u128> {
        validate_address(address)?;
        let result = self.call("eth_getBalance", json!([address, "latest"]))?;
        quantity_u128(&result)
    }

    /// Balance with display conversions attached.
    pub fn get_balance(&self, address: &str) -> WalletResult<BalanceBreakdown> {
        Ok(BalanceBreakdown::from_wei(self.get_balance_wei(address)?))
    }

    //  Transaction preparation

    /// Next transaction nonce for an address, including pending
    /// transactions.
    pub fn get_nonce(&self, address: &str) -> WalletResult<u64> {
        validate_address(address)?;
        let result = self.call("eth_getTransactionCount", json!([address, "pending"]))?;
        quantity_u64(&result)
    }

    /// Current gas price in wei. A reported price of exactly zero is
    /// treated as a broken oracle and replaced by the configured default.
    pub fn get_gas_price_wei(&self) -> WalletResult<u128> {
        let result = self.call("eth_gasPrice", json!([]))?;
        let price = quantity_u128(&result)?;
        if price == 0 {
            log::warn!(
                "Node reported zero gas price, falling back to {} gwei",
                self.settings.default_gas_price_gwei
            );
            return Ok(units::gwei_to_wei(self.settings.default_gas_price_gwei));
        }
        Ok(price)
    }

    /// Estimate gas for a transfer. Prefers the node's estimate; a failed
    /// or zero estimate falls back to the static formula
    /// `21000 + 16 * data_bytes`.
    pub fn estimate_gas(&self, to: &str, value_wei: u128, data: &[u8]) -> WalletResult<u64> {
        validate_address(to)?;
        let skeleton = json!([{
            "to": to,
            "value": format!("0x{:x}", value_wei),
            "data": format!("0x{}", hex::encode(data)),
        }]);

        match self
            .call("eth_estimateGas", skeleton)
            .and_then(|result| quantity_u64(&result))
        {
            Ok(gas) if gas > 0 => Ok(gas),
            Ok(_) => Ok(static_gas_estimate(data)),
            Err(e) => {
                log::warn!("Gas estimation failed: {}, using static estimate", e);
                Ok(static_gas_estimate(data))
            }
        }
    }

    //  Transaction sending

    /// Submit a signed raw transaction; returns the transaction hash.
    pub fn send_raw(&self, signed_tx_hex: &str) -> WalletResult<String> {
        if !signed_tx_hex.starts_with("0x") {
            return Err(WalletError::ValidationError(
                "Raw transaction must start with 0x".to_string(),
            ));
        }
        if signed_tx_hex.len() < 100 {
            log::warn!("Raw transaction looks unusually short");
        }

        let result = self.call("eth_sendRawTransaction", json!([signed_tx_hex]))?;
        let tx_hash = result.as_str().ok_or_else(|| {
            WalletError::NetworkError("Invalid transaction hash in RPC response".to_string())
        })?;
        log::info!("Transaction sent: {}", tx_hash);
        Ok(tx_hash.to_string())
    }

    //  Transaction monitoring

    /// Classify a transaction's observed lifecycle state.
    ///
    /// Network failures during polling are reported as a `status: error`
    /// value rather than raised, since callers typically poll in a loop.
    /// Only a malformed hash raises.
    pub fn get_transaction_status(&self, tx_hash: &str) -> WalletResult<TxStatusReport> {
        validate_tx_hash(tx_hash)?;

        let classify = || -> WalletResult<TxStatusReport> {
            let tx = self.call("eth_getTransactionByHash", json!([tx_hash]))?;
            if tx.is_null() {
                return Ok(TxStatusReport {
                    status: TxStatus::NotFound,
                    message: "Transaction not found".to_string(),
                    gas_used: None,
                    block_number: None,
                });
            }

            let receipt = self.call("eth_getTransactionReceipt", json!([tx_hash]))?;
            if receipt.is_null() {
                return Ok(TxStatusReport {
                    status: TxStatus::Pending,
                    message: "Transaction pending".to_string(),
                    gas_used: None,
                    block_number: None,
                });
            }

            let succeeded = receipt.get("status").and_then(Value::as_str) == Some("0x1");
            let block_number = receipt
                .get("blockNumber")
                .map(quantity_u64)
                .transpose()?
                .unwrap_or(0);
            let gas_used = receipt
                .get("gasUsed")
                .map(quantity_u64)
                .transpose()?
                .unwrap_or(0);

            Ok(TxStatusReport {
                status: if succeeded {
                    TxStatus::Success
                } else {
                    TxStatus::Failed
                },
                message: format!("Confirmed in block {}", block_number),
                gas_used: Some(gas_used),
                block_number: Some(block_number),
            })
        };

        Ok(classify().unwrap_or_else(|e| TxStatusReport {
            status: TxStatus::Error,
            message: e.to_string(),
            gas_used: None,
            block_number: None,
        }))
    }

    //  Block information

    /// Latest block number.
    pub fn get_block_number(&self) -> WalletResult<u64> {
        let result = self.call("eth_blockNumber", json!([]))?;
        quantity_u64(&result)
    }

    /// Basic info about a block by number.
    pub fn get_block_info(&self, block_number: u64) -> WalletResult<BlockInfo> {
        let result = self.call(
            "eth_getBlockByNumber",
            json!([format!("0x{:x}", block_number), false]),
        )?;
        if result.is_null() {
            return Err(WalletError::NotFound(format!(
                "Block {} not found",
                block_number
            )));
        }

        Ok(BlockInfo {
            number: block_number,
            timestamp: result
                .get("timestamp")
                .map(quantity_u64)
                .transpose()?
                .unwrap_or(0),
            miner: result
                .get("miner")
                .and_then(Value::as_str)
                .unwrap_or("0x0")
                .to_string(),
            gas_used: result
                .get("gasUsed")
                .map(quantity_u64)
                .transpose()?
                .unwrap_or(0),
            transaction_count: result
                .get("transactions")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0),
        })
    }

    //  Statistics

    pub fn get_stats(&self) -> GatewayStats {
        let state = self.state.lock();
        let success_rate = if state.call_count > 0 {
            let rate = state.success_count as f64 / state.call_count as f64 * 100.0;
            (rate * 10.0).round() / 10.0
        } else {
            0.0
        };
        GatewayStats {
            total_calls: state.call_count,
            successful_calls: state.success_count,
            success_rate,
            network: network_name(self.settings.expected_chain_id),
        }
    }
}

fn static_gas_estimate(data: &[u8]) -> u64 {
    21_000 + 16 * data.len() as u64
}

fn validate_address(address: &str) -> WalletResult<()> {
    let ok = address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !ok {
        return Err(WalletError::InvalidAddress(format!(
            "Address format is invalid: {}",
            address
        )));
    }
    Ok(())
}

fn validate_tx_hash(tx_hash: &str) -> WalletResult<()> {
    let ok = tx_hash.len() == 66
        && tx_hash.starts_with("0x")
        && tx_hash[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !ok {
        return Err(WalletError::ValidationError(format!(
            "Invalid transaction hash: {}",
            tx_hash
        )));
    }
    Ok(())
}

/// Parse a JSON-RPC quantity (`"0x..."` hex string) as u64.
fn quantity_u64(value: &Value) -> WalletResult<u64> {
    let text = value.as_str().ok_or_else(|| {
        WalletError::NetworkError(format!("Expected hex quantity, got: {}", value))
    })?;
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(stripped, 16)
        .map_err(|_| WalletError::NetworkError(format!("Invalid hex quantity: {}", text)))
}

/// Parse a JSON-RPC quantity as u128 (wei values).
fn quantity_u128(value: &Value) -> WalletResult<u128> {
    let text = value.as_str().ok_or_else(|| {
        WalletError::NetworkError(format!("Expected hex quantity, got: {}", value))
    })?;
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    u128::from_str_radix(stripped, 16)
        .map_err(|_| WalletError::NetworkError(format!("Invalid hex quantity: {}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Transport that replays a scripted sequence of outcomes.
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: Vec<Result<String, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, body: &str) -> Result<String, TransportError> {
            self.requests.lock().push(body.to_string());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Transport("script exhausted".into())))
        }
    }

    fn result(value: &str) -> Result<String, TransportError> {
        Ok(format!(
            r#"{{"jsonrpc":"2.0","id":1,"result":{}}}"#,
            value
        ))
    }

    fn test_config() -> WalletConfig {
        let mut config = WalletConfig::default();
        config.rpc.min_request_interval_ms = 0;
        config.rpc.rate_limit_backoff_base_ms = 10;
        config.rpc.fixed_backoff_ms = 5;
        config
    }

    const CHAIN_ID_HEX: &str = r#""0xaa36a7""#; // 11155111

    fn gateway(mut responses: Vec<Result<String, TransportError>>) -> RpcGateway {
        // Prepend the chain-id handshake consumed at construction.
        responses.insert(0, result(CHAIN_ID_HEX));
        RpcGateway::with_transport(
            &test_config(),
            Box::new(ScriptedTransport::new(responses)),
        )
        .unwrap()
    }

    const ADDR: &str = "0x1234567890123456789012345678901234567890";

    #[test]
    fn connect_validates_chain_id() {
        let transport = ScriptedTransport::new(vec![result(r#""0x1""#)]);
        let err = RpcGateway::with_transport(&test_config(), Box::new(transport)).unwrap_err();
        assert!(matches!(
            err,
            WalletError::ChainMismatch {
                expected: 11_155_111,
                actual: 1
            }
        ));
    }

    #[test]
    fn rate_limited_twice_succeeds_on_third_attempt() {
        let gw = gateway(vec![
            Err(TransportError::RateLimited),
            Err(TransportError::RateLimited),
            result(r#""0x10""#),
        ]);

        let base = Duration::from_millis(10);
        let start = Instant::now();
        let value = gw.call("eth_blockNumber", json!([])).unwrap();
        assert_eq!(value, json!("0x10"));
        // base * 2^0 + base * 2^1
        assert!(start.elapsed() >= base + base * 2);
    }

    #[test]
    fn exhausted_retries_surface_network_error() {
        let gw = gateway(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let err = gw.call("eth_blockNumber", json!([])).unwrap_err();
        assert!(matches!(err, WalletError::NetworkError(_)));
    }

    #[test]
    fn malformed_body_fails_without_retry() {
        let transport = ScriptedTransport::new(vec![
            result(CHAIN_ID_HEX),
            Ok("not json at all".to_string()),
            result(r#""0x10""#), // must not be consumed
        ]);
        let gw = RpcGateway::with_transport(&test_config(), Box::new(transport)).unwrap();
        let err = gw.call("eth_blockNumber", json!([])).unwrap_err();
        assert!(matches!(err, WalletError::NetworkError(_)));

        let stats = gw.get_stats();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.successful_calls, 1);
    }

    #[test]
    fn rpc_error_field_raises_immediately() {
        let gw = gateway(vec![Ok(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#
                .to_string(),
        )]);
        let err = gw.call("eth_sendRawTransaction", json!(["0xdead"])).unwrap_err();
        match err {
            WalletError::RpcError(msg) => assert!(msg.contains("nonce too low")),
            other => panic!("expected RpcError, got {:?}", other),
        }
    }

    #[test]
    fn request_ids_are_monotonic() {
        let gw = gateway(vec![result(r#""0x1""#), result(r#""0x2""#)]);
        gw.call("eth_blockNumber", json!([])).unwrap();
        gw.call("eth_blockNumber", json!([])).unwrap();

        let state = gw.state.lock();
        assert_eq!(state.request_id, 3); // handshake + two calls
        assert_eq!(state.call_count, 3);
        assert_eq!(state.success_count, 3);
    }

    #[test]
    fn balance_is_exact_wei() {
        let gw = gateway(vec![result(r#""0x1bc16d674ec80000""#)]); // 2 ETH
        let balance = gw.get_balance(ADDR).unwrap();
        assert_eq!(balance.wei, 2_000_000_000_000_000_000);
        assert_eq!(balance.ether, 2.0);
        assert_eq!(balance.gwei, 2_000_000_000.0);
    }

    #[test]
    fn zero_gas_price_falls_back_to_default() {
        let gw = gateway(vec![result(r#""0x0""#)]);
        // default_gas_price_gwei = 1
        assert_eq!(gw.get_gas_price_wei().unwrap(), 1_000_000_000);
    }

    #[test]
    fn nonzero_gas_price_passes_through() {
        let gw = gateway(vec![result(r#""0x3b9aca00""#)]); // 1 gwei
        assert_eq!(gw.get_gas_price_wei().unwrap(), 1_000_000_000);
    }

    #[test]
    fn gas_estimate_prefers_network_value() {
        let gw = gateway(vec![result(r#""0x5208""#)]); // 21000
        assert_eq!(gw.estimate_gas(ADDR, 1, &[]).unwrap(), 21_000);
    }

    #[test]
    fn gas_estimate_static_fallback_counts_data_bytes() {
        let gw = gateway(vec![Ok(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"boom"}}"#.to_string(),
        )]);
        let data = vec![0u8; 10];
        assert_eq!(gw.estimate_gas(ADDR, 1, &data).unwrap(), 21_000 + 160);
    }

    #[test]
    fn status_not_found() {
        let gw = gateway(vec![result("null")]);
        let report = gw
            .get_transaction_status(&format!("0x{}", "1".repeat(64)))
            .unwrap();
        assert_eq!(report.status, TxStatus::NotFound);
    }

    #[test]
    fn status_pending_without_receipt() {
        let gw = gateway(vec![result(r#"{"hash":"0x11"}"#), result("null")]);
        let report = gw
            .get_transaction_status(&format!("0x{}", "1".repeat(64)))
            .unwrap();
        assert_eq!(report.status, TxStatus::Pending);
    }

    #[test]
    fn status_success_from_receipt_flag() {
        let gw = gateway(vec![
            result(r#"{"hash":"0x11"}"#),
            result(r#"{"status":"0x1","blockNumber":"0x123","gasUsed":"0x5208"}"#),
        ]);
        let report = gw
            .get_transaction_status(&format!("0x{}", "1".repeat(64)))
            .unwrap();
        assert_eq!(report.status, TxStatus::Success);
        assert_eq!(report.block_number, Some(0x123));
        assert_eq!(report.gas_used, Some(21_000));
    }

    #[test]
    fn status_failed_from_receipt_flag() {
        let gw = gateway(vec![
            result(r#"{"hash":"0x11"}"#),
            result(r#"{"status":"0x0","blockNumber":"0x123","gasUsed":"0x5208"}"#),
        ]);
        let report = gw
            .get_transaction_status(&format!("0x{}", "1".repeat(64)))
            .unwrap();
        assert_eq!(report.status, TxStatus::Failed);
    }

    #[test]
    fn status_polling_swallows_network_errors() {
        let gw = gateway(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let report = gw
            .get_transaction_status(&format!("0x{}", "1".repeat(64)))
            .unwrap();
        assert_eq!(report.status, TxStatus::Error);
    }

    #[test]
    fn status_rejects_malformed_hash() {
        let gw = gateway(vec![]);
        assert!(gw.get_transaction_status("0x123").is_err());
        assert!(gw.get_transaction_status(&"1".repeat(66)).is_err());
    }

    #[test]
    fn stats_reflect_handshake() {
        // Fresh gateway: only the chain-id handshake has run.
        let gw = gateway(vec![]);
        let stats = gw.get_stats();
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.success_rate, 100.0);
        assert_eq!(stats.network, "Sepolia Testnet");
    }

    #[test]
    fn send_raw_requires_prefix() {
        let gw = gateway(vec![]);
        assert!(gw.send_raw("deadbeef").is_err());
    }

    #[test]
    fn rate_limiter_spaces_requests() {
        let mut config = test_config();
        config.rpc.min_request_interval_ms = 20;
        let transport = ScriptedTransport::new(vec![
            result(CHAIN_ID_HEX),
            result(r#""0x1""#),
            result(r#""0x2""#),
        ]);
        let gw = RpcGateway::with_transport(&config, Box::new(transport)).unwrap();

        let start = Instant::now();
        gw.call("eth_blockNumber", json!([])).unwrap();
        gw.call("eth_blockNumber", json!([])).unwrap();
        // Two calls after the handshake: at least two spacing intervals.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn block_info_parses_fields() {
        let gw = gateway(vec![result(
            r#"{"timestamp":"0x64","miner":"0xabc","gasUsed":"0x5208","transactions":["0x1","0x2"]}"#,
        )]);
        let info = gw.get_block_info(291).unwrap();
        assert_eq!(info.number, 291);
        assert_eq!(info.timestamp, 100);
        assert_eq!(info.gas_used, 21_000);
        assert_eq!(info.transaction_count, 2);
    }

    #[test]
    fn missing_block_is_not_found() {
        let gw = gateway(vec![result("null")]);
        assert!(matches!(
            gw.get_block_info(999),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn network_info_reports_disconnected_in_band() {
        let gw = gateway(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let summary = gw.network_info();
        assert!(!summary.connected);
        assert!(summary.error.is_some());
    }

    #[test]
    fn requests_carry_jsonrpc_envelope() {
        use std::sync::Arc;

        struct Shared(Arc<ScriptedTransport>);
        impl Transport for Shared {
            fn execute(&self, body: &str) -> Result<String, TransportError> {
                self.0.execute(body)
            }
        }

        let transport = Arc::new(ScriptedTransport::new(vec![
            result(CHAIN_ID_HEX),
            result(r#""0x1""#),
        ]));
        let gw = RpcGateway::with_transport(
            &test_config(),
            Box::new(Shared(Arc::clone(&transport))),
        )
        .unwrap();
        gw.call("eth_blockNumber", json!([])).unwrap();

        let requests = transport.requests();
        assert!(requests[0].contains(r#""method":"eth_chainId""#));
        assert!(requests[1].contains(r#""method":"eth_blockNumber""#));
        assert!(requests[1].contains(r#""jsonrpc":"2.0""#));
    }
}
