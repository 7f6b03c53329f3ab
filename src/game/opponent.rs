//! Heuristic automated opponent
//!
//! Priority: win, block, centre, random corner, random edge. The automated
//! side signs with its own statically configured key and moves through the
//! same synchronizer path as a human player.

use super::board::{Board, Mark, CENTER, CORNERS, EDGES, WIN_LINES};
use super::contract::GameContract;
use super::snapshot::GameSnapshot;
use super::sync::GameSynchronizer;
use crate::Result;
use alloy::primitives::Address;
use rand::seq::SliceRandom;
use rand::Rng;

/// A free cell that would complete a line for `mark`
fn completing_cell(board: &Board, mark: Mark) -> Option<u8> {
    WIN_LINES.iter().find_map(|line| {
        let owned = line.iter().filter(|&&i| board.get(i) == Some(mark)).count();
        let mut free = line.iter().copied().filter(|&i| board.is_empty_cell(i));
        match (owned, free.next(), free.next()) {
            (2, Some(cell), None) => Some(cell),
            _ => None,
        }
    })
}

fn random_free<R: Rng + ?Sized>(board: &Board, cells: &[u8], rng: &mut R) -> Option<u8> {
    let free: Vec<u8> = cells
        .iter()
        .copied()
        .filter(|&i| board.is_empty_cell(i))
        .collect();
    free.choose(rng).copied()
}

/// Pick a cell for `ai`, or `None` if the board is full
///
/// Deterministic for a given board and RNG state.
pub fn choose_move<R: Rng + ?Sized>(board: &Board, ai: Mark, rng: &mut R) -> Option<u8> {
    if board.is_full() {
        return None;
    }

    completing_cell(board, ai)
        .or_else(|| completing_cell(board, ai.opponent()))
        .or_else(|| board.is_empty_cell(CENTER).then_some(CENTER))
        .or_else(|| random_free(board, &CORNERS, rng))
        .or_else(|| random_free(board, &EDGES, rng))
}

/// Drives the automated side of a game
pub struct AiOpponent<C: GameContract> {
    sync: GameSynchronizer<C>,
}

impl<C: GameContract> AiOpponent<C> {
    /// `sync` must be built around the opponent's own contract handle and
    /// address
    pub fn new(sync: GameSynchronizer<C>) -> Self {
        Self { sync }
    }

    pub fn address(&self) -> Address {
        self.sync.player()
    }

    /// Refetch the game and move if it is the opponent's turn
    ///
    /// Returns the cell played and the snapshot after the move, or `None`
    /// when there was nothing to do.
    pub async fn take_turn(&mut self) -> Result<Option<(u8, GameSnapshot)>> {
        let snapshot = self.sync.refresh().await?;
        if !snapshot.is_turn_of(self.address()) {
            tracing::debug!(game_id = %snapshot.game_id, "Not the opponent's turn");
            return Ok(None);
        }

        let Some(mark) = snapshot.mark_for(self.address()) else {
            return Ok(None);
        };
        let cell = {
            let mut rng = rand::thread_rng();
            choose_move(&snapshot.board, mark, &mut rng)
        };
        let Some(cell) = cell else {
            tracing::debug!(game_id = %snapshot.game_id, "Board full, no move");
            return Ok(None);
        };

        tracing::info!(game_id = %snapshot.game_id, cell, mark = %mark, "Opponent moving");
        let after = self.sync.submit_move(cell).await?;
        Ok(Some((cell, after)))
    }
}
