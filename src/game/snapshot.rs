//! Cached view of a game's on-chain state

use super::board::{Board, Mark};
use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Contract-assigned game identifier
pub type GameId = B256;

/// The tuple returned by the contract's `games(gameId)` getter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRecord {
    pub player1: Address,
    pub player2: Address,
    pub current_turn: Address,
    pub state: u8,
    pub winner: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Ended,
}

impl GameStatus {
    /// Contract state `0` is in progress; every other value is terminal
    pub fn from_state(state: u8) -> Self {
        if state == 0 {
            GameStatus::InProgress
        } else {
            GameStatus::Ended
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "winner")]
pub enum Outcome {
    Win(Address),
    Draw,
}

impl Outcome {
    /// A terminal game with the zero address as winner is a draw
    pub fn from_winner(winner: Address) -> Self {
        if winner == Address::ZERO {
            Outcome::Draw
        } else {
            Outcome::Win(winner)
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win(winner) => write!(f, "Game Over! Winner: {}", winner),
            Outcome::Draw => f.write_str("Game Over! It's a draw!"),
        }
    }
}

/// The client's copy of a game as of the last successful read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub player1: Address,
    pub player2: Address,
    pub current_turn: Address,
    pub state: u8,
    pub winner: Address,
    pub board: Board,
    pub fetched_at: DateTime<Utc>,
}

impl GameSnapshot {
    pub fn new(game_id: GameId, record: GameRecord, board: Board) -> Self {
        Self {
            game_id,
            player1: record.player1,
            player2: record.player2,
            current_turn: record.current_turn,
            state: record.state,
            winner: record.winner,
            board,
            fetched_at: Utc::now(),
        }
    }

    /// Unknown ids read back as an all-zero record
    pub fn exists(&self) -> bool {
        self.player1 != Address::ZERO || self.player2 != Address::ZERO
    }

    pub fn status(&self) -> GameStatus {
        GameStatus::from_state(self.state)
    }

    pub fn is_ended(&self) -> bool {
        self.status() == GameStatus::Ended
    }

    /// `None` while the game is still in progress
    pub fn outcome(&self) -> Option<Outcome> {
        self.is_ended().then(|| Outcome::from_winner(self.winner))
    }

    pub fn is_participant(&self, address: Address) -> bool {
        address == self.player1 || address == self.player2
    }

    pub fn is_turn_of(&self, address: Address) -> bool {
        !self.is_ended() && self.current_turn == address
    }

    /// Player one plays X, player two plays O
    pub fn mark_for(&self, address: Address) -> Option<Mark> {
        if address == self.player1 {
            Some(Mark::X)
        } else if address == self.player2 {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// Whether `self` describes an earlier point of the game than `other`
    ///
    /// On chain, cells only fill up and an ended game stays ended, so a
    /// snapshot with fewer marks (or still running where `other` has ended)
    /// was read before `other`.
    pub fn is_behind(&self, other: &GameSnapshot) -> bool {
        let filled = |s: &GameSnapshot| s.board.to_wire().iter().filter(|&&c| c != 0).count();
        (other.is_ended() && !self.is_ended()) || filled(self) < filled(other)
    }

    pub fn opponent_of(&self, address: Address) -> Option<Address> {
        if address == self.player1 {
            Some(self.player2)
        } else if address == self.player2 {
            Some(self.player1)
        } else {
            None
        }
    }
}
