//! Wallet management and game wallet custody
//!
//! This module handles private key storage, signature-derived encryption of
//! the game wallet, and the local store it lives in. Private keys never leave
//! this module unencrypted except as a `SecretString`.

pub mod cipher;
mod custodian;
mod signer;
pub mod store;

pub use cipher::{decrypt, derive_key, encrypt, CiphertextRecord, EncryptionKey};
pub use custodian::{
    challenge_message, export_private_key, signature_text, ChallengeSigner, IdentitySource, KeyCustodian,
    UnlockedWallet,
};
pub use signer::SecureWallet;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
