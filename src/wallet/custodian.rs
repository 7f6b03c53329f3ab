//! Game wallet custody
//!
//! The connected wallet signs a fixed challenge; the signature is hashed into
//! an encryption key; the game wallet's private key is stored encrypted under
//! that key, keyed by the connected address. Re-signing the same challenge in
//! a later session restores the same game wallet.

use super::cipher::{decrypt_str, derive_key, encrypt};
use super::signer::SecureWallet;
use super::store::{game_wallet_key, KeyValueStore};
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::Address;
use alloy::signers::Signature;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

/// Challenge text the connected wallet signs to unlock its game wallet
pub fn challenge_message(account: Address) -> String {
    format!(
        "Hello {}, sign this message to prove ownership!",
        account.to_checksum(None)
    )
}

/// Render a signature as the 0x-prefixed hex text that keys are derived from
pub fn signature_text(signature: &Signature) -> SecretString {
    SecretString::from(hex::encode_prefixed(signature.as_bytes()))
}

/// The game wallet key for a manual backup
pub fn export_private_key(wallet: &SecureWallet) -> SecretString {
    tracing::warn!(game_wallet = %wallet.address(), "Exporting game wallet private key");
    wallet.private_key_hex()
}

/// The externally connected wallet, as far as custody is concerned
///
/// Implementations return [`Error::SignatureDeclined`] when the user refuses
/// the signing prompt.
#[async_trait]
pub trait ChallengeSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_challenge(&self, message: &str) -> Result<Signature>;
}

#[async_trait]
impl ChallengeSigner for SecureWallet {
    fn address(&self) -> Address {
        SecureWallet::address(self)
    }

    async fn sign_challenge(&self, message: &str) -> Result<Signature> {
        self.sign_message(message)
            .map_err(|e| Error::SignatureDeclined(e.to_string()))
    }
}

/// Where an unlocked game wallet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Decrypted from an existing record
    Restored,
    /// Freshly generated and stored
    Generated,
}

/// Result of [`KeyCustodian::unlock`]
#[derive(Debug)]
pub struct UnlockedWallet {
    pub connected: Address,
    pub game_wallet: SecureWallet,
    pub source: IdentitySource,
}

/// Owns the encrypted game wallet records
#[derive(Clone)]
pub struct KeyCustodian {
    store: Arc<dyn KeyValueStore>,
}

impl KeyCustodian {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Ask the connected wallet to sign the challenge for its address
    pub async fn request_signature(&self, signer: &dyn ChallengeSigner) -> Result<SecretString> {
        let message = challenge_message(signer.address());
        let signature = signer.sign_challenge(&message).await?;
        Ok(signature_text(&signature))
    }

    /// Sign the challenge and restore or create the game wallet
    ///
    /// A declined signature leaves storage untouched.
    pub async fn unlock(&self, signer: &dyn ChallengeSigner) -> Result<UnlockedWallet> {
        let connected = signer.address();
        let signature = self.request_signature(signer).await?;
        let (game_wallet, source) = self.resolve_identity(connected, &signature)?;

        Ok(UnlockedWallet {
            connected,
            game_wallet,
            source,
        })
    }

    /// Restore the game wallet for `account`, or create and store a new one
    ///
    /// A record that exists but does not decrypt under the key derived from
    /// `signature` is an error; the record is never replaced.
    pub fn load_or_create_identity(
        &self,
        account: Address,
        signature: &SecretString,
    ) -> Result<SecureWallet> {
        self.resolve_identity(account, signature)
            .map(|(wallet, _)| wallet)
    }

    fn resolve_identity(
        &self,
        account: Address,
        signature: &SecretString,
    ) -> Result<(SecureWallet, IdentitySource)> {
        let key = derive_key(signature.expose_secret());
        let storage_key = game_wallet_key(account);

        if let Some(record) = self.store.get(&storage_key)? {
            let private_key = SecretString::from(decrypt_str(&record, &key)?);
            let wallet = SecureWallet::from_hex(private_key.expose_secret())
                .map_err(|_| Error::Decryption("record does not hold a private key".to_string()))?;

            tracing::info!(
                connected = %account,
                game_wallet = %wallet.address(),
                "Restored game wallet"
            );
            return Ok((wallet, IdentitySource::Restored));
        }

        let wallet = SecureWallet::random();
        let record = encrypt(wallet.private_key_hex().expose_secret(), &key)?;
        self.store.set(&storage_key, &record.to_string())?;

        tracing::info!(
            connected = %account,
            game_wallet = %wallet.address(),
            "Generated and encrypted game wallet"
        );
        Ok((wallet, IdentitySource::Generated))
    }

    /// Whether a game wallet record exists for `account`
    pub fn has_identity(&self, account: Address) -> Result<bool> {
        Ok(self.store.get(&game_wallet_key(account))?.is_some())
    }

    /// Delete the stored game wallet for `account`
    ///
    /// Irreversible: funds held by the game wallet are lost unless its key
    /// was exported first.
    pub fn forget_identity(&self, account: Address) -> Result<bool> {
        let removed = self.store.remove(&game_wallet_key(account))?;
        if removed {
            tracing::warn!(connected = %account, "Deleted stored game wallet");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::store::{JsonFileStore, MemoryStore};

    const CONNECTED_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    struct DecliningSigner(Address);

    #[async_trait]
    impl ChallengeSigner for DecliningSigner {
        fn address(&self) -> Address {
            self.0
        }

        async fn sign_challenge(&self, _message: &str) -> Result<Signature> {
            Err(Error::SignatureDeclined("user rejected the request".to_string()))
        }
    }

    fn custodian() -> (KeyCustodian, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (KeyCustodian::new(store.clone()), store)
    }

    #[test]
    fn test_challenge_message_format() {
        let connected = SecureWallet::from_hex(CONNECTED_KEY).unwrap();
        let msg = challenge_message(connected.address());
        assert_eq!(
            msg,
            format!(
                "Hello {}, sign this message to prove ownership!",
                connected.address_string()
            )
        );
    }

    #[test]
    fn test_load_or_create_is_idempotent() {
        let (custodian, _) = custodian();
        let account = Address::repeat_byte(0x11);
        let signature = SecretString::from("0xdeadbeef");

        let first = custodian.load_or_create_identity(account, &signature).unwrap();
        let second = custodian.load_or_create_identity(account, &signature).unwrap();
        assert_eq!(first.address(), second.address());
    }

    #[test]
    fn test_accounts_get_distinct_wallets() {
        let (custodian, _) = custodian();
        let signature = SecretString::from("0xdeadbeef");

        let a = custodian
            .load_or_create_identity(Address::repeat_byte(0x11), &signature)
            .unwrap();
        let b = custodian
            .load_or_create_identity(Address::repeat_byte(0x22), &signature)
            .unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_wrong_signature_is_surfaced_and_record_kept() {
        let (custodian, store) = custodian();
        let account = Address::repeat_byte(0x11);

        custodian
            .load_or_create_identity(account, &SecretString::from("0xright"))
            .unwrap();
        let record_before = store.get(&game_wallet_key(account)).unwrap();

        let err = custodian
            .load_or_create_identity(account, &SecretString::from("0xwrong"))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));

        assert_eq!(store.get(&game_wallet_key(account)).unwrap(), record_before);
    }

    #[test]
    fn test_corrupted_record_is_decryption_error() {
        let (custodian, store) = custodian();
        let account = Address::repeat_byte(0x11);
        store.set(&game_wallet_key(account), "garbage").unwrap();

        let err = custodian
            .load_or_create_identity(account, &SecretString::from("0xsig"))
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
        assert_eq!(
            store.get(&game_wallet_key(account)).unwrap().as_deref(),
            Some("garbage")
        );
    }

    #[test]
    fn test_record_holding_non_key_is_decryption_error() {
        let (custodian, store) = custodian();
        let account = Address::repeat_byte(0x11);
        let signature = SecretString::from("0xsig");
        let record = encrypt("not a private key", &derive_key(signature.expose_secret())).unwrap();
        store.set(&game_wallet_key(account), &record.to_string()).unwrap();

        let err = custodian.load_or_create_identity(account, &signature).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[tokio::test]
    async fn test_declined_signature_leaves_no_state() {
        let (custodian, store) = custodian();
        let account = Address::repeat_byte(0x33);

        let err = custodian.unlock(&DecliningSigner(account)).await.unwrap_err();
        assert!(matches!(err, Error::SignatureDeclined(_)));
        assert_eq!(store.get(&game_wallet_key(account)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_generate_then_restore_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let connected = SecureWallet::from_hex(CONNECTED_KEY).unwrap();

        // First session: nothing stored, a new game wallet is generated
        let first = {
            let custodian = KeyCustodian::new(Arc::new(JsonFileStore::open(&path).unwrap()));
            assert!(!custodian.has_identity(connected.address()).unwrap());

            let unlocked = custodian.unlock(&connected).await.unwrap();
            assert_eq!(unlocked.source, IdentitySource::Generated);
            assert_eq!(unlocked.connected, connected.address());
            unlocked.game_wallet.address()
        };

        // "Reload": fresh store handle, same challenge re-signed
        let custodian = KeyCustodian::new(Arc::new(JsonFileStore::open(&path).unwrap()));
        let unlocked = custodian.unlock(&connected).await.unwrap();
        assert_eq!(unlocked.source, IdentitySource::Restored);
        assert_eq!(unlocked.game_wallet.address(), first);
    }

    #[tokio::test]
    async fn test_forget_then_unlock_generates_new_wallet() {
        let (custodian, _) = custodian();
        let connected = SecureWallet::from_hex(CONNECTED_KEY).unwrap();

        let first = custodian.unlock(&connected).await.unwrap();
        assert!(custodian.forget_identity(connected.address()).unwrap());
        assert!(!custodian.forget_identity(connected.address()).unwrap());

        let second = custodian.unlock(&connected).await.unwrap();
        assert_eq!(second.source, IdentitySource::Generated);
        assert_ne!(first.game_wallet.address(), second.game_wallet.address());
    }

    #[test]
    fn test_exported_key_restores_same_wallet() {
        let wallet = SecureWallet::random();
        let exported = export_private_key(&wallet);
        let restored = SecureWallet::from_hex(exported.expose_secret()).unwrap();
        assert_eq!(restored.address(), wallet.address());
    }

    #[test]
    fn test_unsaved_wallet_is_never_handed_out() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = Arc::new(JsonFileStore::open(blocker.join("store.json")).unwrap());
        let custodian = KeyCustodian::new(store);
        let account = Address::repeat_byte(0x11);
        let signature = SecretString::from("0xdeadbeef");

        for _ in 0..2 {
            let err = custodian
                .load_or_create_identity(account, &signature)
                .unwrap_err();
            assert!(matches!(err, Error::Storage(_)));
        }
        assert!(!custodian.has_identity(account).unwrap());
    }
}
