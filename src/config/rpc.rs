//! RPC endpoint configuration
//!
//! Resolution order:
//! 1. `MONAD_RPC_URL` - highest priority
//! 2. `NEXT_PUBLIC_MONAD_RPC_URL` - shared with the web frontend's `.env`
//! 3. Public devnet RPC fallback - rate limited, for testing only
//!
//! # Examples
//!
//! ```bash
//! export MONAD_RPC_URL="https://rpc-devnet.monadinfra.com/rpc/YOUR_KEY"
//! ```

use crate::{Error, Result};
use url::Url;

/// Environment variable names
pub(crate) mod env_vars {
    pub const MONAD_RPC_URL: &str = "MONAD_RPC_URL";
    pub const NEXT_PUBLIC_MONAD_RPC_URL: &str = "NEXT_PUBLIC_MONAD_RPC_URL";
}

/// Public devnet RPC (rate limited, for testing only)
pub const PUBLIC_DEVNET_RPC: &str =
    "https://rpc-devnet.monadinfra.com/rpc/3fe540e310bbb6ef0b9f16cd23073b0a";

/// RPC configuration for the game chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    url: String,
}

impl RpcConfig {
    /// Create RPC config from environment variables
    pub fn from_env() -> Self {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Resolve the URL through `lookup`, in priority order
    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let configured = [env_vars::MONAD_RPC_URL, env_vars::NEXT_PUBLIC_MONAD_RPC_URL]
            .into_iter()
            .find_map(|name| {
                let url = lookup(name).filter(|v| !v.trim().is_empty())?;
                tracing::debug!("Using {} for the game chain", name);
                Some(url.trim().to_string())
            });

        let url = configured.unwrap_or_else(|| {
            tracing::warn!("No RPC configured, using public devnet RPC (rate limited)");
            PUBLIC_DEVNET_RPC.to_string()
        });

        Self { url }
    }

    /// Create with an explicit RPC URL
    pub fn with_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid RPC URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "RPC URL must be http(s), got {}",
                parsed.scheme()
            )));
        }
        Ok(Self {
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
