//! Event subscriptions scoped to a single game
//!
//! A [`Subscription`] owns a background task bound to one game id. Dropping
//! or cancelling it aborts the task; callbacks never run after that point, so
//! a subscription can't update the view of a game that is no longer shown.

use super::contract::{GameContract, GameEvent};
use super::snapshot::{GameId, GameSnapshot, Outcome};
use super::sync::fetch_snapshot;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct Subscription {
    game_id: GameId,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Start watching `game_id`
    ///
    /// `on_move` receives a fresh snapshot after every move; `on_end` receives
    /// the final snapshot and outcome, after which the subscription finishes.
    /// Must be called inside a tokio runtime.
    pub fn spawn<C, M, E>(contract: Arc<C>, game_id: GameId, on_move: M, on_end: E) -> Self
    where
        C: GameContract,
        M: Fn(GameSnapshot) + Send + Sync + 'static,
        E: Fn(GameSnapshot, Outcome) + Send + Sync + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(watch(
            contract,
            game_id,
            on_move,
            on_end,
            cancelled.clone(),
        ));

        tracing::debug!(game_id = %game_id, "Subscribed to game events");
        Self {
            game_id,
            cancelled,
            handle: Some(handle),
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// False once cancelled or after the game-ended callback ran
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop delivering events
    ///
    /// No callback starts after this returns, but on a multi-threaded
    /// runtime one that is already running may still be finishing. Use
    /// [`Subscription::shutdown`] to wait for it.
    pub fn cancel(self) {}

    /// Stop delivering events and wait until no callback is running
    pub async fn shutdown(mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // Resolves once the task has stopped, cancelled or not
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        tracing::debug!(game_id = %self.game_id, "Cleaned up event listeners");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("game_id", &self.game_id)
            .field("active", &self.is_active())
            .finish()
    }
}

async fn watch<C, M, E>(
    contract: Arc<C>,
    game_id: GameId,
    on_move: M,
    on_end: E,
    cancelled: Arc<AtomicBool>,
) where
    C: GameContract,
    M: Fn(GameSnapshot),
    E: Fn(GameSnapshot, Outcome),
{
    let mut events = match contract.events(game_id).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(game_id = %game_id, error = %e, "Failed to open event stream");
            return;
        }
    };

    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(game_id = %game_id, error = %e, "Event stream error");
                continue;
            }
        };

        if event.game_id() != game_id {
            continue;
        }

        match event {
            GameEvent::MoveMade {
                player, position, ..
            } => {
                tracing::debug!(game_id = %game_id, %player, position, "MoveMade event detected");
                match fetch_snapshot(contract.as_ref(), game_id).await {
                    Ok(snapshot) if !cancelled.load(Ordering::SeqCst) => on_move(snapshot),
                    Ok(_) => return,
                    Err(e) => {
                        tracing::warn!(game_id = %game_id, error = %e, "Refetch after move failed")
                    }
                }
            }
            GameEvent::Ended { state, winner, .. } => {
                tracing::debug!(game_id = %game_id, state, %winner, "GameEnded event detected");
                match fetch_snapshot(contract.as_ref(), game_id).await {
                    Ok(snapshot) if !cancelled.load(Ordering::SeqCst) => {
                        let outcome = snapshot
                            .outcome()
                            .unwrap_or_else(|| Outcome::from_winner(winner));
                        on_end(snapshot, outcome);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(game_id = %game_id, error = %e, "Refetch after end failed")
                    }
                }
                return;
            }
            GameEvent::Created { .. } => {}
        }
    }
}
