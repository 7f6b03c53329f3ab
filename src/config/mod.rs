//! Configuration for the MicMacMoe client

pub mod rpc;

use crate::{Error, Result};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Game contract address
pub const CONTRACT_ADDRESS_ENV: &str = "MICMACMOE_CONTRACT_ADDRESS";
/// Private key of the automated opponent
pub const AI_PRIVATE_KEY_ENV: &str = "AI_PRIVATE_KEY";
/// Public address of the automated opponent
pub const AI_WALLET_ADDRESS_ENV: &str = "AI_WALLET_ADDRESS";
/// Private key standing in for the user's externally connected wallet
pub const CONNECTED_PRIVATE_KEY_ENV: &str = "CONNECTED_PRIVATE_KEY";

/// Names the web frontend uses for the same values
const FRONTEND_CONTRACT_ADDRESS_ENV: &str = "NEXT_PUBLIC_MICMACMOE_CONTRACT_ADDRESS";
const FRONTEND_AI_WALLET_ADDRESS_ENV: &str = "NEXT_PUBLIC_AI_WALLET_ADDRESS";

/// Chain the game contract lives on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    /// Symbol of the native currency used for gas
    pub native_symbol: String,
    pub explorer_url: String,
}

impl ChainConfig {
    pub fn monad_devnet() -> Self {
        Self {
            chain_id: 20143,
            name: "Monad Devnet".to_string(),
            native_symbol: "DMON".to_string(),
            explorer_url: "https://explorer.monad-devnet.devnet101.com".to_string(),
        }
    }

    /// Explorer link for a transaction
    pub fn tx_url(&self, tx_hash: impl std::fmt::Display) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::monad_devnet()
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    /// MicMacMoe contract address
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// JSON file holding encrypted game wallets and the active game id
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Event polling interval (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Address of the automated opponent
    #[serde(default)]
    pub ai_address: Option<Address>,
    /// Opponent invited when `create` is given none
    #[serde(default = "default_opponent")]
    pub default_opponent: Option<Address>,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("micmacmoe-store.json")
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_opponent() -> Option<Address> {
    Some(Address::new([
        0x0d, 0xc3, 0xde, 0xfe, 0x80, 0x75, 0x59, 0x3c, 0x96, 0xbe, 0x54, 0x2f, 0xfd, 0x2b, 0x0b,
        0x19, 0x33, 0x80, 0xd9, 0x37,
    ]))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            contract_address: None,
            storage_path: default_storage_path(),
            poll_interval_ms: default_poll_interval_ms(),
            ai_address: None,
            default_opponent: default_opponent(),
        }
    }
}

impl Config {
    /// Read a JSON config file, or start from defaults, then apply env
    /// overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&content)
                    .map_err(|e| Error::Config(format!("Invalid {}: {}", path.display(), e)))?
            }
            None => Config::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())
    }

    /// Fill addresses from the environment; values already set win
    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let address = |names: [&str; 2]| -> Result<Option<Address>> {
            for name in names {
                if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                    let parsed = Address::from_str(value.trim())
                        .map_err(|e| Error::Config(format!("{} is not an address: {}", name, e)))?;
                    return Ok(Some(parsed));
                }
            }
            Ok(None)
        };

        if self.contract_address.is_none() {
            self.contract_address =
                address([CONTRACT_ADDRESS_ENV, FRONTEND_CONTRACT_ADDRESS_ENV])?;
        }
        if self.ai_address.is_none() {
            self.ai_address = address([AI_WALLET_ADDRESS_ENV, FRONTEND_AI_WALLET_ADDRESS_ENV])?;
        }
        Ok(self)
    }

    /// The contract address, which every game operation needs
    pub fn contract_address(&self) -> Result<Address> {
        self.contract_address.ok_or_else(|| {
            Error::Config(format!(
                "No contract address: set contract_address or {}",
                CONTRACT_ADDRESS_ENV
            ))
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn config_deserialize_defaults() {
        let parsed: Config = serde_json::from_value(serde_json::json!({})).expect("parse config");
        assert_eq!(parsed.chain.chain_id, 20143);
        assert_eq!(parsed.chain.native_symbol, "DMON");
        assert_eq!(parsed.storage_path, PathBuf::from("micmacmoe-store.json"));
        assert_eq!(parsed.poll_interval(), Duration::from_millis(1000));
        assert_eq!(parsed.contract_address, None);
        assert_eq!(
            parsed.default_opponent.map(|a| a.to_checksum(None)),
            Some("0x0DC3defe8075593c96Be542fFD2b0B193380D937".to_string())
        );
    }

    #[test]
    fn config_deserialize_explicit() {
        let value = serde_json::json!({
            "chain": {
                "chain_id": 31337,
                "name": "Anvil",
                "native_symbol": "ETH",
                "explorer_url": "http://localhost"
            },
            "contract_address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "storage_path": "/tmp/store.json",
            "poll_interval_ms": 250,
            "ai_address": null,
            "default_opponent": null
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.chain.chain_id, 31337);
        assert_eq!(parsed.poll_interval_ms, 250);
        assert_eq!(parsed.default_opponent, None);
        assert!(parsed.contract_address().is_ok());
    }

    #[test]
    fn env_fills_missing_addresses() {
        let config = Config::default()
            .apply_env(lookup(&[
                (
                    FRONTEND_CONTRACT_ADDRESS_ENV,
                    "0x5fbdb2315678afecb367f032d93f642f64180aa3",
                ),
                (
                    AI_WALLET_ADDRESS_ENV,
                    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
                ),
            ]))
            .unwrap();

        assert_eq!(
            config.contract_address().unwrap(),
            Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap()
        );
        assert!(config.ai_address.is_some());
    }

    #[test]
    fn file_values_beat_env() {
        let from_file = Address::repeat_byte(0x11);
        let config = Config {
            contract_address: Some(from_file),
            ..Config::default()
        }
        .apply_env(lookup(&[(
            CONTRACT_ADDRESS_ENV,
            "0x5fbdb2315678afecb367f032d93f642f64180aa3",
        )]))
        .unwrap();
        assert_eq!(config.contract_address, Some(from_file));
    }

    #[test]
    fn bad_env_address_is_config_error() {
        let err = Config::default()
            .apply_env(lookup(&[(CONTRACT_ADDRESS_ENV, "0x1234")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_contract_address() {
        assert!(matches!(
            Config::default().contract_address(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn tx_url() {
        let chain = ChainConfig {
            explorer_url: "https://explorer.example/".to_string(),
            ..ChainConfig::monad_devnet()
        };
        assert_eq!(chain.tx_url("0xabc"), "https://explorer.example/tx/0xabc");
    }
}
