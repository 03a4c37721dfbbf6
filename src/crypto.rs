//! Key material handling: secp256k1 key generation, Ethereum address
//! derivation, and password-based private-key encryption.
//!
//! The encryption format is fixed by `KDF_VERSION`: PBKDF2-HMAC-SHA256 with
//! 100,000 iterations over a 16-byte salt derives a 32-byte AES-256-GCM key;
//! the stored blob is `nonce || ciphertext || tag`. Any parameter change
//! must bump the version so existing records stay decryptable.

use k256::ecdsa::{SigningKey, VerifyingKey};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::errors::{WalletError, WalletResult};

pub const KDF_VERSION: u16 = 1;
pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PRIVATE_KEY_LEN: usize = 32;

/// Keccak-256 digest, used for address derivation and transaction hashing.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Draw a fresh random private key scalar.
///
/// `SigningKey::from_slice` rejects zero and values at or beyond the curve
/// order; the redraw loop covers that vanishing-probability case.
pub fn generate_private_key() -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
    let mut rng = OsRng;
    loop {
        let mut candidate = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        rng.fill_bytes(candidate.as_mut());
        if SigningKey::from_slice(candidate.as_ref()).is_ok() {
            return candidate;
        }
    }
}

/// Parse a private key as exactly 64 hex characters (no `0x` prefix) and
/// reject scalars outside the valid secp256k1 range.
pub fn parse_private_key(private_key_hex: &str) -> WalletResult<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    if private_key_hex.len() != PRIVATE_KEY_LEN * 2 {
        return Err(WalletError::InvalidKey(
            "Private key must be 64 hexadecimal characters".to_string(),
        ));
    }

    let decoded = Zeroizing::new(hex::decode(private_key_hex).map_err(|_| {
        WalletError::InvalidKey("Private key must be 64 hexadecimal characters".to_string())
    })?);

    let mut key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    key.copy_from_slice(&decoded);

    if SigningKey::from_slice(key.as_ref()).is_err() {
        return Err(WalletError::InvalidKey(
            "Private key is not a valid secp256k1 scalar".to_string(),
        ));
    }
    Ok(key)
}

/// Derive the Ethereum address for a private key: the last 20 bytes of
/// keccak256 over the uncompressed public key (64-byte X||Y, 0x04 prefix
/// excluded).
pub fn derive_address(private_key: &[u8; PRIVATE_KEY_LEN]) -> WalletResult<String> {
    let signing_key = SigningKey::from_slice(private_key)
        .map_err(|_| WalletError::InvalidKey("Private key is out of curve range".to_string()))?;
    Ok(address_from_verifying_key(signing_key.verifying_key()))
}

/// Address derivation from an already-known public key.
pub fn address_from_verifying_key(verifying_key: &VerifyingKey) -> String {
    let point = verifying_key.to_encoded_point(false);
    // Uncompressed SEC1 encoding is 0x04 || X || Y; the prefix byte is
    // excluded from the hash.
    let digest = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Salt and opaque ciphertext produced by [`encrypt_private_key`].
pub struct EncryptedKey {
    pub salt: [u8; SALT_LEN],
    /// `nonce || ciphertext || tag`
    pub blob: Vec<u8>,
}

/// Encrypt a private key under a password-derived AES-256-GCM key with a
/// fresh random salt and nonce.
pub fn encrypt_private_key(
    private_key: &[u8; PRIVATE_KEY_LEN],
    password: &SecretString,
) -> WalletResult<EncryptedKey> {
    let mut rng = OsRng;
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let key = derive_encryption_key(password, &salt);
    let sealing_key = aead_key(&key)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out: Vec<u8> = private_key.to_vec();
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::ValidationError("Encryption failure".to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&in_out);
    Ok(EncryptedKey { salt, blob })
}

/// Decrypt an encrypted private-key blob.
///
/// Every failure path collapses to the same `DecryptionError`: a wrong
/// password, a truncated blob, and a tampered ciphertext are intentionally
/// indistinguishable to the caller.
pub fn decrypt_private_key(
    salt: &[u8],
    blob: &[u8],
    password: &SecretString,
) -> WalletResult<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    if salt.len() != SALT_LEN || blob.len() < NONCE_LEN + aead::AES_256_GCM.tag_len() {
        return Err(WalletError::DecryptionError);
    }
    let mut salt_bytes = [0u8; SALT_LEN];
    salt_bytes.copy_from_slice(salt);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&blob[..NONCE_LEN]);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let key = derive_encryption_key(password, &salt_bytes);
    let opening_key = aead_key(&key).map_err(|_| WalletError::DecryptionError)?;

    let mut in_out = Zeroizing::new(blob[NONCE_LEN..].to_vec());
    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::DecryptionError)?;

    if plaintext.len() != PRIVATE_KEY_LEN {
        return Err(WalletError::DecryptionError);
    }
    let mut private_key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    private_key.copy_from_slice(plaintext);
    Ok(private_key)
}

fn derive_encryption_key(password: &SecretString, salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        PBKDF2_ITERATIONS,
        key.as_mut(),
    );
    key
}

fn aead_key(key: &Zeroizing<[u8; KEY_LEN]>) -> WalletResult<LessSafeKey> {
    let unbound = UnboundKey::new(&aead::AES_256_GCM, key.as_ref())
        .map_err(|_| WalletError::ValidationError("Invalid encryption key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}
