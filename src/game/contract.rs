//! MicMacMoe contract client
//!
//! [`GameContract`] is the seam between the synchronizer and the chain.
//! [`MicMacMoeContract`] implements it over an alloy HTTP provider; event
//! delivery polls `eth_getFilterChanges` for the game's logs.

use super::snapshot::{GameId, GameRecord};
use crate::chain::{classify_error, connect, connect_with_signer, GENERIC_FAILURE};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::{Address, LogData, TxHash};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{Filter, Log, TransactionReceipt};
use alloy::sol;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;

sol! {
    #[sol(rpc)]
    contract MicMacMoe {
        function createGame(address player2, address player1) external returns (bytes32 gameId);
        function makeMove(bytes32 gameId, uint8 position, address player) external;
        function games(bytes32 gameId) external view returns (
            address player1,
            address player2,
            address currentTurn,
            uint8 state,
            address winner
        );
        function getBoard(bytes32 gameId) external view returns (uint8[9]);
        function getPlayerGames(address player) external view returns (bytes32[]);

        event GameCreated(bytes32 indexed gameId, address indexed player1, address indexed player2);
        event MoveMade(bytes32 indexed gameId, address indexed player, uint8 position);
        event GameEnded(bytes32 indexed gameId, uint8 state, address winner);
    }
}

/// Contract events the client reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Created {
        game_id: GameId,
        player1: Address,
        player2: Address,
    },
    MoveMade {
        game_id: GameId,
        player: Address,
        position: u8,
    },
    Ended {
        game_id: GameId,
        state: u8,
        winner: Address,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> GameId {
        match self {
            GameEvent::Created { game_id, .. }
            | GameEvent::MoveMade { game_id, .. }
            | GameEvent::Ended { game_id, .. } => *game_id,
        }
    }
}

/// Decode a MicMacMoe log; `None` for unrelated or malformed logs
pub fn decode_event(data: &LogData) -> Option<GameEvent> {
    let topic0 = *data.topics().first()?;

    if topic0 == MicMacMoe::MoveMade::SIGNATURE_HASH {
        let e = MicMacMoe::MoveMade::decode_log_data(data).ok()?;
        Some(GameEvent::MoveMade {
            game_id: e.gameId,
            player: e.player,
            position: e.position,
        })
    } else if topic0 == MicMacMoe::GameEnded::SIGNATURE_HASH {
        let e = MicMacMoe::GameEnded::decode_log_data(data).ok()?;
        Some(GameEvent::Ended {
            game_id: e.gameId,
            state: e.state,
            winner: e.winner,
        })
    } else if topic0 == MicMacMoe::GameCreated::SIGNATURE_HASH {
        let e = MicMacMoe::GameCreated::decode_log_data(data).ok()?;
        Some(GameEvent::Created {
            game_id: e.gameId,
            player1: e.player1,
            player2: e.player2,
        })
    } else {
        None
    }
}

/// The game id from the first indexed topic of a `GameCreated` log
pub fn game_id_from_logs(logs: &[Log], contract: Address) -> Option<GameId> {
    logs.iter()
        .filter(|log| log.address() == contract)
        .find_map(|log| match log.topics() {
            [sig, game_id, ..] if *sig == MicMacMoe::GameCreated::SIGNATURE_HASH => Some(*game_id),
            _ => None,
        })
}

/// The id assigned by a mined `createGame`
///
/// The game exists on chain once the transaction is mined, so a missing log
/// is not retryable.
fn created_game_id(logs: &[Log], contract: Address, tx_hash: TxHash) -> Result<GameId> {
    game_id_from_logs(logs, contract).ok_or_else(|| {
        Error::UnexpectedReceipt(format!(
            "createGame receipt {} has no GameCreated log",
            tx_hash
        ))
    })
}

/// Operations the client needs from the game contract
#[async_trait]
pub trait GameContract: Send + Sync + 'static {
    /// Submit `createGame` and wait for it to be mined
    async fn create_game(&self, opponent: Address, creator: Address) -> Result<GameId>;

    /// Submit `makeMove` and wait for it to be mined
    async fn make_move(&self, game_id: GameId, position: u8, player: Address) -> Result<()>;

    async fn game(&self, game_id: GameId) -> Result<GameRecord>;

    async fn board(&self, game_id: GameId) -> Result<[u8; 9]>;

    async fn player_games(&self, player: Address) -> Result<Vec<GameId>>;

    /// Stream of events concerning `game_id`
    ///
    /// Implementations may deliver events for other games too; consumers
    /// filter by id.
    async fn events(&self, game_id: GameId) -> Result<BoxStream<'static, Result<GameEvent>>>;
}

/// alloy-backed MicMacMoe client
#[derive(Clone)]
pub struct MicMacMoeContract {
    instance: MicMacMoe::MicMacMoeInstance<DynProvider>,
    provider: DynProvider,
    poll_interval: Duration,
}

impl MicMacMoeContract {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

    pub fn new(provider: DynProvider, address: Address) -> Self {
        Self {
            instance: MicMacMoe::new(address, provider.clone()),
            provider,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Client that signs transactions with `signer`
    pub fn connect(rpc_url: &str, address: Address, signer: &SecureWallet) -> Result<Self> {
        Ok(Self::new(connect_with_signer(rpc_url, signer)?, address))
    }

    /// Client for reads and event watching only
    pub fn read_only(rpc_url: &str, address: Address) -> Result<Self> {
        Ok(Self::new(connect(rpc_url)?, address))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    fn check_status(receipt: &TransactionReceipt) -> Result<()> {
        if receipt.status() {
            Ok(())
        } else {
            Err(Error::TransactionReverted {
                reason: GENERIC_FAILURE.to_string(),
            })
        }
    }
}

#[async_trait]
impl GameContract for MicMacMoeContract {
    async fn create_game(&self, opponent: Address, creator: Address) -> Result<GameId> {
        let pending = self
            .instance
            .createGame(opponent, creator)
            .send()
            .await
            .map_err(classify_error)?;
        tracing::debug!(tx_hash = %pending.tx_hash(), "createGame submitted");

        let receipt = pending.get_receipt().await.map_err(classify_error)?;
        Self::check_status(&receipt)?;

        created_game_id(
            receipt.inner.logs(),
            self.address(),
            receipt.transaction_hash,
        )
    }

    async fn make_move(&self, game_id: GameId, position: u8, player: Address) -> Result<()> {
        let pending = self
            .instance
            .makeMove(game_id, position, player)
            .send()
            .await
            .map_err(classify_error)?;
        tracing::debug!(tx_hash = %pending.tx_hash(), position, "makeMove submitted");

        let receipt = pending.get_receipt().await.map_err(classify_error)?;
        Self::check_status(&receipt)
    }

    async fn game(&self, game_id: GameId) -> Result<GameRecord> {
        let game = self
            .instance
            .games(game_id)
            .call()
            .await
            .map_err(classify_error)?;

        Ok(GameRecord {
            player1: game.player1,
            player2: game.player2,
            current_turn: game.currentTurn,
            state: game.state,
            winner: game.winner,
        })
    }

    async fn board(&self, game_id: GameId) -> Result<[u8; 9]> {
        self.instance
            .getBoard(game_id)
            .call()
            .await
            .map_err(classify_error)
    }

    async fn player_games(&self, player: Address) -> Result<Vec<GameId>> {
        self.instance
            .getPlayerGames(player)
            .call()
            .await
            .map_err(classify_error)
    }

    async fn events(&self, game_id: GameId) -> Result<BoxStream<'static, Result<GameEvent>>> {
        let filter = Filter::new()
            .address(self.address())
            .event_signature(vec![
                MicMacMoe::MoveMade::SIGNATURE_HASH,
                MicMacMoe::GameEnded::SIGNATURE_HASH,
            ])
            .topic1(game_id);

        let poller = self
            .provider
            .watch_logs(&filter)
            .await
            .map_err(classify_error)?
            .with_poll_interval(self.poll_interval);

        let events = poller
            .into_stream()
            .flat_map(|logs| {
                stream::iter(
                    logs.into_iter()
                        .filter_map(|log| decode_event(&log.inner.data)),
                )
            })
            .map(Ok)
            .boxed();

        Ok(events)
    }
}
