//! MicMacMoe client
//!
//! Client for an on-chain tic-tac-toe contract:
//! - Game wallet custody: a per-user key, encrypted under a key derived from
//!   the connected wallet's signature and restored by re-signing
//! - Game state synchronization: create, join, move and subscribe, with the
//!   contract as the single source of truth
//! - A heuristic automated opponent
//!
//! # Security Model
//!
//! - Game wallet keys are stored only as AES-256-GCM ciphertext
//! - Key material is held in `SecretString` and redacted from `Debug`
//! - Nothing is persisted before the chain has confirmed it

pub mod chain;
pub mod config;
pub mod game;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{ChainConfig, Config, RpcConfig};
pub use error::{Error, Result};
pub use game::{GameSnapshot, GameSynchronizer, MicMacMoeContract};
pub use wallet::{KeyCustodian, SecureWallet};
