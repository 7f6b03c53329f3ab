//! In-memory MicMacMoe stand-in for tests

use super::board::{Board, Mark};
use super::contract::{GameContract, GameEvent};
use super::snapshot::{GameId, GameRecord};
use crate::{Error, Result};
use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

const STATE_ACTIVE: u8 = 0;
const STATE_WON: u8 = 1;
const STATE_DRAW: u8 = 2;

struct MockGame {
    record: GameRecord,
    board: Board,
}

#[derive(Default)]
pub struct MockContract {
    games: Mutex<HashMap<GameId, MockGame>>,
    player_games: Mutex<HashMap<Address, Vec<GameId>>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<Result<GameEvent>>>>,
    created: AtomicUsize,
    pub move_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
    /// Transactions fail with a network error while set
    pub fail_writes: AtomicBool,
    /// Reads fail with a network error while set
    pub fail_reads: AtomicBool,
}

impl MockContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event to every open stream, as if it came from the chain
    pub fn emit(&self, event: GameEvent) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|tx| tx.unbounded_send(Ok(event)).is_ok());
    }

    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }
}

#[async_trait]
impl GameContract for MockContract {
    async fn create_game(&self, opponent: Address, creator: Address) -> Result<GameId> {
        self.check(&self.fail_writes)?;
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let game_id = keccak256(n.to_be_bytes());

        self.games.lock().unwrap().insert(
            game_id,
            MockGame {
                record: GameRecord {
                    player1: creator,
                    player2: opponent,
                    current_turn: creator,
                    state: STATE_ACTIVE,
                    winner: Address::ZERO,
                },
                board: Board::empty(),
            },
        );
        {
            let mut index = self.player_games.lock().unwrap();
            index.entry(creator).or_default().push(game_id);
            index.entry(opponent).or_default().push(game_id);
        }

        self.emit(GameEvent::Created {
            game_id,
            player1: creator,
            player2: opponent,
        });
        Ok(game_id)
    }

    async fn make_move(&self, game_id: GameId, position: u8, player: Address) -> Result<()> {
        self.move_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_writes)?;
        let revert = |reason: &str| Error::TransactionReverted {
            reason: reason.to_string(),
        };

        let ended = {
            let mut games = self.games.lock().unwrap();
            let game = games.get_mut(&game_id).ok_or_else(|| revert("Game does not exist"))?;
            if game.record.state != STATE_ACTIVE {
                return Err(revert("Game already ended"));
            }
            if game.record.current_turn != player {
                return Err(revert("Not your turn"));
            }
            let mark = if player == game.record.player1 {
                Mark::X
            } else {
                Mark::O
            };
            game.board
                .place(position, mark)
                .map_err(|_| revert("Invalid position"))?;

            if game.board.winner().is_some() {
                game.record.state = STATE_WON;
                game.record.winner = player;
            } else if game.board.is_full() {
                game.record.state = STATE_DRAW;
            } else {
                game.record.current_turn = if player == game.record.player1 {
                    game.record.player2
                } else {
                    game.record.player1
                };
            }
            (game.record.state != STATE_ACTIVE).then_some((game.record.state, game.record.winner))
        };

        self.emit(GameEvent::MoveMade {
            game_id,
            player,
            position,
        });
        if let Some((state, winner)) = ended {
            self.emit(GameEvent::Ended {
                game_id,
                state,
                winner,
            });
        }
        Ok(())
    }

    async fn game(&self, game_id: GameId) -> Result<GameRecord> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_reads)?;
        let games = self.games.lock().unwrap();
        Ok(games.get(&game_id).map(|g| g.record).unwrap_or(GameRecord {
            player1: Address::ZERO,
            player2: Address::ZERO,
            current_turn: Address::ZERO,
            state: STATE_ACTIVE,
            winner: Address::ZERO,
        }))
    }

    async fn board(&self, game_id: GameId) -> Result<[u8; 9]> {
        self.check(&self.fail_reads)?;
        let games = self.games.lock().unwrap();
        Ok(games.get(&game_id).map(|g| g.board.to_wire()).unwrap_or([0; 9]))
    }

    async fn player_games(&self, player: Address) -> Result<Vec<GameId>> {
        Ok(self
            .player_games
            .lock()
            .unwrap()
            .get(&player)
            .cloned()
            .unwrap_or_default())
    }

    async fn events(&self, _game_id: GameId) -> Result<BoxStream<'static, Result<GameEvent>>> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }
}

/// Unused id for "unknown game" cases
pub fn unknown_game() -> GameId {
    B256::repeat_byte(0xee)
}
