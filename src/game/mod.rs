//! MicMacMoe game client
//!
//! Board model, contract bindings, the session synchronizer, event
//! subscriptions and the heuristic opponent.

pub mod board;
pub mod contract;
#[cfg(test)]
mod mock;
pub mod opponent;
pub mod snapshot;
pub mod subscription;
pub mod sync;

pub use board::{Board, Mark};
pub use contract::{GameContract, GameEvent, MicMacMoeContract};
pub use opponent::{choose_move, AiOpponent};
pub use snapshot::{GameId, GameRecord, GameSnapshot, GameStatus, Outcome};
pub use subscription::Subscription;
pub use sync::{fetch_snapshot, fund_game_wallet, GameSynchronizer, SessionState};
