//! Error types for the MicMacMoe client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Signature request declined: {0}")]
    SignatureDeclined(String),

    #[error("Could not decrypt game wallet: {0}")]
    Decryption(String),

    #[error("No invite: {0} is not a player in this game")]
    Authorization(String),

    #[error("It's not your turn!")]
    NotYourTurn,

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Game is already over")]
    GameOver,

    #[error("No active game")]
    NoActiveGame,

    #[error("Transaction reverted: {reason}")]
    TransactionReverted { reason: String },

    /// A transaction was mined but its receipt is not what the contract
    /// should produce; retrying would repeat the transaction
    #[error("Unexpected receipt: {0}")]
    UnexpectedReceipt(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same operation may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_retryable() {
        assert!(Error::Network("timeout".to_string()).is_retryable());
        assert!(!Error::UnexpectedReceipt("no log".to_string()).is_retryable());
        assert!(!Error::TransactionReverted {
            reason: "Not your turn".to_string()
        }
        .is_retryable());
        assert!(!Error::NotYourTurn.is_retryable());
    }
}
