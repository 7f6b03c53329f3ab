//! Signature-derived encryption for the game wallet
//!
//! The encryption key is `SHA-256(signature text)`, so the same signed
//! challenge always reproduces the same key and nothing key-related is
//! ever persisted. Records are AES-256-GCM: a wrong key fails the tag check
//! instead of yielding garbage plaintext.

use crate::{Error, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use alloy::hex;
use secrecy::zeroize::Zeroize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of the AES-GCM nonce stored in front of each record
pub const IV_LEN: usize = 12;

/// Length of the GCM authentication tag appended to the ciphertext
const TAG_LEN: usize = 16;

/// Separator between the IV and ciphertext halves of a record
const SEPARATOR: char = ':';

/// 256-bit symmetric key derived from a signature. Zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// An encrypted wallet record: `<iv-hex>:<ciphertext-hex>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiphertextRecord {
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
}

impl CiphertextRecord {
    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

impl fmt::Display for CiphertextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            hex::encode(self.iv),
            SEPARATOR,
            hex::encode(&self.ciphertext)
        )
    }
}

impl FromStr for CiphertextRecord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (iv_hex, ct_hex) = s
            .trim()
            .split_once(SEPARATOR)
            .ok_or_else(|| Error::Decryption("record is missing the IV separator".to_string()))?;

        let iv_bytes =
            hex::decode(iv_hex).map_err(|e| Error::Decryption(format!("bad IV hex: {}", e)))?;
        let iv: [u8; IV_LEN] = iv_bytes.as_slice().try_into().map_err(|_| {
            Error::Decryption(format!(
                "IV must be {} bytes, got {}",
                IV_LEN,
                iv_bytes.len()
            ))
        })?;

        let ciphertext = hex::decode(ct_hex)
            .map_err(|e| Error::Decryption(format!("bad ciphertext hex: {}", e)))?;
        if ciphertext.len() < TAG_LEN {
            return Err(Error::Decryption("ciphertext is truncated".to_string()));
        }

        Ok(Self { iv, ciphertext })
    }
}

/// Derive the symmetric key for a signature string
pub fn derive_key(signature: &str) -> EncryptionKey {
    let digest = Sha256::digest(signature.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    EncryptionKey(key)
}

/// Encrypt `plaintext` under `key` with a fresh random IV
pub fn encrypt(plaintext: &str, key: &EncryptionKey) -> Result<CiphertextRecord> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Wallet(format!("Invalid encryption key: {}", e)))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| Error::Wallet("Encryption failed".to_string()))?;

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(nonce.as_slice());

    Ok(CiphertextRecord { iv, ciphertext })
}

/// Decrypt a record. Any key other than the one used to encrypt fails.
pub fn decrypt(record: &CiphertextRecord, key: &EncryptionKey) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Decryption(format!("Invalid encryption key: {}", e)))?;
    let nonce = Nonce::from_slice(&record.iv);

    let plaintext = cipher
        .decrypt(nonce, record.ciphertext.as_slice())
        .map_err(|_| Error::Decryption("wrong key or corrupted record".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|_| Error::Decryption("plaintext is not valid UTF-8".to_string()))
}

/// Parse and decrypt a stored record string in one step
pub fn decrypt_str(record: &str, key: &EncryptionKey) -> Result<String> {
    decrypt(&record.parse()?, key)
}
