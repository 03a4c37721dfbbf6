//! Legacy (pre-EIP-1559) transfer pipeline: build, EIP-155 sign, broadcast,
//! and status checks.
//!
//! Signing never leaves this process. The raw transaction is assembled with
//! the RLP encoder in [`crate::rlp`], signed over its keccak256 digest, and
//! self-verified by recovering the signer address before anything is
//! returned to the caller.

use std::time::Duration;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use secrecy::SecretString;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::config::{TransactionConfig, WalletConfig};
use crate::crypto;
use crate::errors::{WalletError, WalletResult};
use crate::retry::{with_retries, RetryDecision};
use crate::rlp::{self, RlpItem};
use crate::rpc::{RpcGateway, TxStatusReport};
use crate::units;
use crate::validation::{address_to_bytes, InputValidator};
use crate::wallet::WalletManager;

/// A fully parameterized transfer, ready for signing. All money fields are
/// wei.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    pub to: String,
    pub value: u128,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
    pub data: Vec<u8>,
}

impl UnsignedTransaction {
    /// Reject structurally incomplete transactions before any encoding.
    pub fn validate(&self) -> WalletResult<()> {
        if self.to.is_empty() {
            return Err(WalletError::ValidationError(
                "Missing transaction field: to".to_string(),
            ));
        }
        address_to_bytes(&self.to)?;
        if self.gas_limit == 0 {
            return Err(WalletError::ValidationError(
                "Missing transaction field: gas_limit".to_string(),
            ));
        }
        if self.gas_price == 0 {
            return Err(WalletError::ValidationError(
                "Missing transaction field: gas_price".to_string(),
            ));
        }
        if self.chain_id == 0 {
            return Err(WalletError::ValidationError(
                "Missing transaction field: chain_id".to_string(),
            ));
        }
        Ok(())
    }

    /// EIP-155 signing preimage: the RLP list
    /// `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`.
    pub fn signing_preimage(&self) -> WalletResult<Vec<u8>> {
        self.validate()?;
        let to = address_to_bytes(&self.to)?;
        Ok(rlp::encode(&RlpItem::List(vec![
            RlpItem::uint(self.nonce as u128),
            RlpItem::uint(self.gas_price),
            RlpItem::uint(self.gas_limit as u128),
            RlpItem::bytes(to.to_vec()),
            RlpItem::uint(self.value),
            RlpItem::bytes(self.data.clone()),
            RlpItem::uint(self.chain_id as u128),
            RlpItem::uint(0),
            RlpItem::uint(0),
        ])))
    }

    /// Serialize with the signature spliced in:
    /// `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`.
    fn apply_signature(&self, v: u64, r: &[u8; 32], s: &[u8; 32]) -> WalletResult<Vec<u8>> {
        let to = address_to_bytes(&self.to)?;
        Ok(rlp::encode(&RlpItem::List(vec![
            RlpItem::uint(self.nonce as u128),
            RlpItem::uint(self.gas_price),
            RlpItem::uint(self.gas_limit as u128),
            RlpItem::bytes(to.to_vec()),
            RlpItem::uint(self.value),
            RlpItem::bytes(self.data.clone()),
            RlpItem::uint(v as u128),
            RlpItem::uint_be(r),
            RlpItem::uint_be(s),
        ])))
    }

    /// Sign with EIP-155 replay protection and a canonical low-s signature.
    ///
    /// The produced signature is verified by recovering the signer address
    /// from it; a mismatch against the key's own address aborts the
    /// transfer before broadcast.
    pub fn sign(&self, private_key: &Zeroizing<[u8; 32]>) -> WalletResult<SignedTransaction> {
        let signing_key = SigningKey::from_slice(private_key.as_ref())
            .map_err(|_| WalletError::InvalidKey("Private key is out of curve range".to_string()))?;
        let expected = crypto::address_from_verifying_key(signing_key.verifying_key());

        let digest = crypto::keccak256(&self.signing_preimage()?);
        let (mut signature, mut recovery_id) = signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| WalletError::SignatureVerification(format!("Signing failed: {}", e)))?;

        // Canonicalize to low-s; flipping s across the curve order also
        // flips the recovered point's parity bit.
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::from_byte(recovery_id.to_byte() ^ 1).ok_or_else(|| {
                WalletError::SignatureVerification("Invalid recovery id".to_string())
            })?;
        }

        let v = recovery_id.to_byte() as u64 + 35 + 2 * self.chain_id;
        let (r_bytes, s_bytes) = signature.split_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        s.copy_from_slice(&s_bytes);

        let recovered = recover_signer(&digest, v, &r, &s, self.chain_id)?;
        if recovered != expected {
            return Err(WalletError::SignatureVerification(
                "Signature verification failed".to_string(),
            ));
        }

        let raw = self.apply_signature(v, &r, &s)?;
        let tx_hash = format!("0x{}", hex::encode(crypto::keccak256(&raw)));
        Ok(SignedTransaction {
            raw_transaction: format!("0x{}", hex::encode(&raw)),
            tx_hash,
            from: expected,
        })
    }
}

/// Output of the signing step; carries no key material.
#[derive(Debug, Clone, Serialize)]
pub struct SignedTransaction {
    /// `0x`-prefixed RLP encoding, ready for `eth_sendRawTransaction`.
    pub raw_transaction: String,
    /// keccak256 of the raw encoding.
    pub tx_hash: String,
    /// Signer address recovered from the signature.
    pub from: String,
}

/// Recover the signer address from an EIP-155 signature over `digest`.
pub fn recover_signer(
    digest: &[u8; 32],
    v: u64,
    r: &[u8; 32],
    s: &[u8; 32],
    chain_id: u64,
) -> WalletResult<String> {
    let base = 2 * chain_id + 35;
    let parity = v.checked_sub(base).ok_or_else(|| {
        WalletError::SignatureVerification(format!("Signature v {} below EIP-155 range", v))
    })?;
    if parity > 1 {
        return Err(WalletError::SignatureVerification(format!(
            "Signature v {} does not match chain id {}",
            v, chain_id
        )));
    }

    let signature = Signature::from_scalars(*r, *s)
        .map_err(|_| WalletError::SignatureVerification("Invalid signature scalars".to_string()))?;
    let recovery_id = RecoveryId::from_byte(parity as u8)
        .ok_or_else(|| WalletError::SignatureVerification("Invalid recovery id".to_string()))?;
    let verifying_key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|_| {
            WalletError::SignatureVerification("Signature does not recover to a key".to_string())
        })?;
    Ok(crypto::address_from_verifying_key(&verifying_key))
}

/// Clamp a network gas price into the configured band, in wei. The result
/// never exceeds the maximum and never drops below the default.
pub fn clamp_gas_price(network_wei: u128, config: &TransactionConfig) -> u128 {
    let default_wei = units::gwei_to_wei(config.default_gas_price_gwei);
    let max_wei = units::gwei_to_wei(config.max_gas_price_gwei);
    network_wei.min(max_wei).max(default_wei)
}

/// Summary of a broadcast transfer, returned to the caller for display and
/// later status polling.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub amount_ether: String,
    pub value_wei: u128,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price_gwei: f64,
}

/// Orchestrates the transfer pipeline against a connected gateway and a
/// wallet store.
pub struct TransactionManager<'a> {
    rpc: &'a RpcGateway,
    wallets: &'a WalletManager,
    tx_config: TransactionConfig,
    chain_id: u64,
    retry_backoff: Duration,
    max_retries: u32,
    validator: InputValidator,
}

impl<'a> TransactionManager<'a> {
    pub fn new(
        rpc: &'a RpcGateway,
        wallets: &'a WalletManager,
        config: &WalletConfig,
    ) -> WalletResult<Self> {
        Ok(Self {
            rpc,
            wallets,
            tx_config: config.transaction.clone(),
            chain_id: config.network.chain_id,
            retry_backoff: Duration::from_millis(config.rpc.fixed_backoff_ms),
            max_retries: config.rpc.max_retries,
            validator: InputValidator::new()?,
        })
    }

    /// Assemble an unsigned transfer: validate inputs, fetch nonce and gas
    /// parameters, and check the balance covers value plus the worst-case
    /// fee.
    pub fn build_transaction(
        &self,
        from: &str,
        to: &str,
        amount_ether: &str,
    ) -> WalletResult<UnsignedTransaction> {
        if !self.validator.is_valid_address(from) {
            return Err(WalletError::InvalidAddress(format!(
                "Invalid sender address: {}",
                from
            )));
        }
        if !self.validator.is_valid_address(to) {
            return Err(WalletError::InvalidAddress(format!(
                "Invalid recipient address: {}",
                to
            )));
        }
        self.validator.validate_amount(amount_ether)?;
        let value = units::ether_to_wei(amount_ether)?;
        if value == 0 {
            return Err(WalletError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let balance = self.rpc.get_balance_wei(from)?;
        if balance < value {
            return Err(WalletError::InsufficientFunds(format!(
                "Insufficient balance: have {} wei, need {} wei",
                balance, value
            )));
        }

        let nonce = self.fetch_nonce(from)?;
        let gas_price = clamp_gas_price(self.rpc.get_gas_price_wei()?, &self.tx_config);
        let gas_limit = match self.rpc.estimate_gas(to, value, &[]) {
            Ok(gas) => gas,
            Err(e) => {
                log::warn!("Gas estimation unavailable: {}, using default limit", e);
                self.tx_config.default_gas_limit
            }
        };

        let fee = gas_limit as u128 * gas_price;
        let total = value.checked_add(fee).ok_or_else(|| {
            WalletError::InvalidAmount("Transfer total overflows".to_string())
        })?;
        if balance < total {
            return Err(WalletError::InsufficientFunds(format!(
                "Insufficient funds for gas: have {} wei, need {} wei ({} value + {} fee)",
                balance, total, value, fee
            )));
        }

        Ok(UnsignedTransaction {
            nonce,
            to: to.to_string(),
            value,
            gas_limit,
            gas_price,
            chain_id: self.chain_id,
            data: Vec::new(),
        })
    }

    /// The nonce fetch gets its own retry wrapper on top of the gateway's
    /// internal retries; a wrong nonce invalidates the whole transfer.
    /// Every failure mode, node-side errors included, collapses into one
    /// `NetworkError` once the attempts are spent.
    fn fetch_nonce(&self, address: &str) -> WalletResult<u64> {
        with_retries(
            self.max_retries,
            || self.rpc.get_nonce(address),
            |error, _| {
                log::warn!("Nonce fetch failed: {}", error);
                RetryDecision::Retry(self.retry_backoff)
            },
        )
        .map_err(|_| WalletError::NetworkError("Failed to fetch nonce after retries".to_string()))
    }

    /// Decrypt the sender's key and sign. The decrypted key never outlives
    /// this call.
    pub fn sign_transaction(
        &self,
        tx: &UnsignedTransaction,
        from: &str,
        password: &SecretString,
    ) -> WalletResult<SignedTransaction> {
        let private_key = self.wallets.decrypt_key(from, password)?;
        let signed = tx.sign(&private_key)?;
        if signed.from != from {
            return Err(WalletError::SignatureVerification(format!(
                "Stored key does not match sender address {}",
                from
            )));
        }
        Ok(signed)
    }

    /// Full pipeline: build, sign, broadcast. Broadcast retries transient
    /// network failures only; a node-side rejection (bad nonce, underpriced)
    /// is final.
    pub fn send_transaction(
        &self,
        from: &str,
        to: &str,
        amount_ether: &str,
        password: &SecretString,
    ) -> WalletResult<TransferReceipt> {
        let tx = self.build_transaction(from, to, amount_ether)?;
        let signed = self.sign_transaction(&tx, from, password)?;

        let tx_hash = with_retries(
            self.max_retries,
            || self.rpc.send_raw(&signed.raw_transaction),
            |error, _| match error {
                WalletError::NetworkError(_) => RetryDecision::Retry(self.retry_backoff),
                _ => RetryDecision::Fatal,
            },
        )?;

        log::info!(
            "Transfer of {} ETH from {} to {} broadcast as {}",
            amount_ether,
            from,
            to,
            tx_hash
        );
        Ok(TransferReceipt {
            tx_hash,
            from: signed.from,
            to: tx.to.clone(),
            amount_ether: amount_ether.to_string(),
            value_wei: tx.value,
            nonce: tx.nonce,
            gas_limit: tx.gas_limit,
            gas_price_gwei: units::wei_to_gwei_display(tx.gas_price),
        })
    }

    /// Poll the observed status of a broadcast transaction.
    pub fn check_status(&self, tx_hash: &str) -> WalletResult<TxStatusReport> {
        self.rpc
            .get_transaction_status(tx_hash)
            .map_err(|e| WalletError::StatusCheck(e.to_string()))
    }
}
