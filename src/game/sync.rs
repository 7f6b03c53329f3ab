//! Game state synchronizer
//!
//! Holds the local session view (state machine + last snapshot) and keeps it
//! in line with the contract. The on-chain snapshot always wins: every local
//! action ends with a refetch, and nothing is shown optimistically.

use super::board::Board;
use super::contract::GameContract;
use super::snapshot::{GameId, GameSnapshot, Outcome};
use super::subscription::Subscription;
use crate::chain::transfer_native;
use crate::wallet::store::{KeyValueStore, GAME_ID_KEY};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::{Address, TxHash};
use std::str::FromStr;
use std::sync::Arc;

/// Client session state
///
/// `NoGame -> Creating -> Active -> Ended` or
/// `NoGame -> Joining -> Active -> Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoGame,
    Creating,
    Joining,
    Active,
    Ended,
}

/// Read `games` and `getBoard` for one game
pub async fn fetch_snapshot<C: GameContract + ?Sized>(
    contract: &C,
    game_id: GameId,
) -> Result<GameSnapshot> {
    let (record, cells) = futures::try_join!(contract.game(game_id), contract.board(game_id))?;
    Ok(GameSnapshot::new(game_id, record, Board::from_wire(&cells)?))
}

/// Deposit native currency from the connected wallet into the game wallet
///
/// Moves are paid for by the game wallet, so it needs a balance before the
/// first transaction.
pub async fn fund_game_wallet(
    rpc_url: &str,
    connected: &SecureWallet,
    game_wallet: Address,
    amount: &str,
) -> Result<TxHash> {
    if game_wallet == connected.address() {
        return Err(Error::InvalidArgument(
            "game wallet must differ from the connected wallet".to_string(),
        ));
    }
    transfer_native(rpc_url, connected, game_wallet, amount).await
}

pub struct GameSynchronizer<C: GameContract> {
    contract: Arc<C>,
    store: Arc<dyn KeyValueStore>,
    player: Address,
    state: SessionState,
    game_id: Option<GameId>,
    snapshot: Option<GameSnapshot>,
}

impl<C: GameContract> GameSynchronizer<C> {
    /// `contract` must sign with the identity that plays as `player`
    pub fn new(contract: Arc<C>, store: Arc<dyn KeyValueStore>, player: Address) -> Self {
        Self {
            contract,
            store,
            player,
            state: SessionState::NoGame,
            game_id: None,
            snapshot: None,
        }
    }

    pub fn player(&self) -> Address {
        self.player
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn game_id(&self) -> Option<GameId> {
        self.game_id
    }

    pub fn snapshot(&self) -> Option<&GameSnapshot> {
        self.snapshot.as_ref()
    }

    /// Whether the last snapshot says it is our move
    pub fn is_my_turn(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| s.is_turn_of(self.player))
    }

    /// Create a game against `opponent` and make it the active game
    pub async fn create_game(&mut self, opponent: Address) -> Result<GameId> {
        if opponent == Address::ZERO || opponent == self.player {
            return Err(Error::InvalidArgument(format!(
                "{} cannot be invited as opponent",
                opponent
            )));
        }

        let previous = self.state;
        self.state = SessionState::Creating;
        tracing::info!(player = %self.player, %opponent, "Creating game");

        let game_id = match self.contract.create_game(opponent, self.player).await {
            Ok(game_id) => game_id,
            Err(e) => {
                self.state = previous;
                return Err(e);
            }
        };

        // Mined on chain even if it can't be saved; keep the id in the error
        if let Err(e) = self.activate(game_id) {
            self.state = previous;
            return Err(Error::Storage(format!(
                "game {} was created but could not be saved: {}",
                game_id, e
            )));
        }
        tracing::info!(game_id = %game_id, "Game created");

        // Stays `Creating` until a snapshot lands; `refresh` completes it
        if let Err(e) = self.refresh().await {
            tracing::warn!(game_id = %game_id, error = %e, "Initial refetch failed");
        }
        Ok(game_id)
    }

    /// Load `game_id` and make it active if we are one of its players
    pub async fn join_game(&mut self, game_id: GameId) -> Result<GameSnapshot> {
        let previous = self.state;
        self.state = SessionState::Joining;

        let snapshot = match fetch_snapshot(self.contract.as_ref(), game_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.state = previous;
                return Err(e);
            }
        };

        if !snapshot.exists() {
            self.state = previous;
            return Err(Error::InvalidArgument(format!("Game {} not found", game_id)));
        }
        if !snapshot.is_participant(self.player) {
            self.state = previous;
            return Err(Error::Authorization(self.player.to_string()));
        }

        if let Err(e) = self.activate(game_id) {
            self.state = previous;
            return Err(e);
        }
        self.snapshot = None;
        self.apply_snapshot(snapshot.clone());
        tracing::info!(game_id = %game_id, player = %self.player, "Joined game");
        Ok(snapshot)
    }

    /// Re-join the game id saved by a previous session, if any
    pub async fn resume(&mut self) -> Result<Option<GameSnapshot>> {
        let Some(saved) = self.store.get(GAME_ID_KEY)? else {
            return Ok(None);
        };

        let game_id = GameId::from_str(saved.trim())
            .map_err(|e| Error::Storage(format!("saved game id {:?} is invalid: {}", saved, e)))?;
        tracing::info!(game_id = %game_id, "Resuming saved game");
        self.join_game(game_id).await.map(Some)
    }

    /// Play `cell` in the active game
    ///
    /// Turn, range and occupancy are checked against the last snapshot first;
    /// a failed check never reaches the network. The contract remains the
    /// authority and may still revert.
    pub async fn submit_move(&mut self, cell: u8) -> Result<GameSnapshot> {
        let snapshot = self.snapshot.as_ref().ok_or(Error::NoActiveGame)?;
        if snapshot.is_ended() {
            return Err(Error::GameOver);
        }
        if !snapshot.is_turn_of(self.player) {
            return Err(Error::NotYourTurn);
        }
        snapshot.board.check_playable(cell)?;
        let game_id = snapshot.game_id;

        tracing::info!(game_id = %game_id, cell, player = %self.player, "Submitting move");
        self.contract.make_move(game_id, cell, self.player).await?;
        self.refresh().await
    }

    /// Refetch the active game from the contract
    pub async fn refresh(&mut self) -> Result<GameSnapshot> {
        let game_id = self.game_id.ok_or(Error::NoActiveGame)?;
        let snapshot = fetch_snapshot(self.contract.as_ref(), game_id).await?;
        tracing::debug!(game_id = %game_id, turn = %snapshot.current_turn, "Game state updated");
        self.apply_snapshot(snapshot.clone());
        Ok(snapshot)
    }

    /// Adopt a snapshot delivered by a subscription or another refetch
    ///
    /// Snapshots for other games, and reads that finished out of order
    /// behind what we already hold, are ignored. Returns whether it was
    /// applied.
    pub fn apply_snapshot(&mut self, snapshot: GameSnapshot) -> bool {
        if self.game_id != Some(snapshot.game_id) {
            tracing::debug!(game_id = %snapshot.game_id, "Ignoring snapshot for inactive game");
            return false;
        }
        if let Some(current) = &self.snapshot {
            if snapshot.is_behind(current) {
                tracing::debug!(game_id = %snapshot.game_id, "Ignoring stale snapshot");
                return false;
            }
        }

        self.state = if snapshot.is_ended() {
            SessionState::Ended
        } else {
            SessionState::Active
        };
        self.snapshot = Some(snapshot);
        true
    }

    /// Outcome of the active game, once ended
    pub fn outcome(&self) -> Option<Outcome> {
        self.snapshot.as_ref().and_then(GameSnapshot::outcome)
    }

    /// Forget the active game locally; the on-chain record is untouched
    pub fn close_game(&mut self) -> Result<()> {
        self.store.remove(GAME_ID_KEY)?;
        self.game_id = None;
        self.snapshot = None;
        self.state = SessionState::NoGame;
        Ok(())
    }

    /// Ids of all games the player takes part in
    pub async fn my_games(&self) -> Result<Vec<GameId>> {
        self.contract.player_games(self.player).await
    }

    /// Subscribe to the active game's events
    pub fn subscribe<M, E>(&self, on_move: M, on_end: E) -> Result<Subscription>
    where
        M: Fn(GameSnapshot) + Send + Sync + 'static,
        E: Fn(GameSnapshot, Outcome) + Send + Sync + 'static,
    {
        let game_id = self.game_id.ok_or(Error::NoActiveGame)?;
        Ok(Subscription::spawn(
            self.contract.clone(),
            game_id,
            on_move,
            on_end,
        ))
    }

    /// Persist `game_id` and make it current; nothing changes if the write fails
    fn activate(&mut self, game_id: GameId) -> Result<()> {
        self.store.set(GAME_ID_KEY, &game_id.to_string())?;
        if self.game_id != Some(game_id) {
            self.snapshot = None;
        }
        self.game_id = Some(game_id);
        Ok(())
    }
}
