//! Signing identities
//!
//! SECURITY: This is the ONLY place where private keys exist in memory.
//! - Keys are held in alloy's PrivateKeySigner which handles crypto securely
//! - Keys are never serialized to JSON
//! - Keys only leave this module wrapped in a SecretString (for encryption or backup)
//! - Keys are never logged

use crate::{Error, Result};
use alloy::hex;
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use secrecy::SecretString;

/// Signing identity that protects its private key
///
/// Used both for the externally connected wallet and for the locally
/// generated game wallet. The private key is:
/// - Stored in alloy's PrivateKeySigner
/// - Never serialized (no Serialize impl)
/// - Only handed out as a SecretString
#[derive(Clone)]
pub struct SecureWallet {
    /// The signer
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
    /// Ethereum wallet for alloy integration
    wallet: EthereumWallet,
}

impl SecureWallet {
    /// Create a wallet from an environment variable holding a hex private key
    pub fn from_env(var_name: &str) -> Result<Self> {
        let key_hex = std::env::var(var_name).map_err(|_| {
            Error::Wallet(format!(
                "Environment variable {} not set. Required for wallet initialization.",
                var_name
            ))
        })?;

        Self::from_hex(&key_hex)
    }

    /// Create a wallet from a hex-encoded private key (with or without 0x)
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::Wallet(format!("Invalid private key: {}", e)))?;

        Ok(Self::from_signer(signer))
    }

    /// Generate a brand new random key pair
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        let wallet = EthereumWallet::from(signer.clone());

        Self {
            signer,
            address,
            wallet,
        }
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as a checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Get a reference to the EthereumWallet for use with alloy providers
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }

    /// Sign an EIP-191 personal message
    pub fn sign_message(&self, message: &str) -> Result<Signature> {
        self.signer
            .sign_message_sync(message.as_bytes())
            .map_err(|e| Error::Wallet(format!("Signing failed: {}", e)))
    }

    /// Export the private key as 0x-prefixed hex
    ///
    /// The only way key material leaves this type. Callers must keep it
    /// wrapped and never log it.
    pub fn private_key_hex(&self) -> SecretString {
        SecretString::from(hex::encode_prefixed(self.signer.to_bytes()))
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecureWallet {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for SecureWallet {}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    // Anvil's first dev account (DO NOT use in production!)
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_hex() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();

        assert_eq!(
            wallet.address_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_from_hex_accepts_unprefixed_key() {
        let prefixed = SecureWallet::from_hex(TEST_KEY).unwrap();
        let bare = SecureWallet::from_hex(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(prefixed, bare);
    }

    #[test]
    fn test_invalid_key_is_wallet_error() {
        let err = SecureWallet::from_hex("0xnothex").unwrap_err();
        assert!(matches!(err, Error::Wallet(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();

        let debug_str = format!("{:?}", wallet);

        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_private_key_export_restores_same_address() {
        let wallet = SecureWallet::random();
        let exported = wallet.private_key_hex();

        assert!(exported.expose_secret().starts_with("0x"));
        let restored = SecureWallet::from_hex(exported.expose_secret()).unwrap();
        assert_eq!(restored.address(), wallet.address());
    }

    #[test]
    fn test_random_wallets_differ() {
        assert_ne!(SecureWallet::random(), SecureWallet::random());
    }

    #[test]
    fn test_message_signature_is_deterministic() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();
        let a = wallet.sign_message("hello").unwrap();
        let b = wallet.sign_message("hello").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, wallet.sign_message("goodbye").unwrap());
    }
}
