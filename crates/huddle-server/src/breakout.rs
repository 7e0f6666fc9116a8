use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use huddle_breakout::{BreakoutGame, GameEnd, Phase};
use huddle_core::PlayerId;
use huddle_core::protocol::ServerEvent;

use crate::registry::{ClientSender, ConnId, RoomLife, RoomStore};

/// Fixed simulation rate.
pub const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

pub type SharedBreakout = Arc<RwLock<BreakoutEngine>>;

/// Owned handle to a room's tick task. Stopping is idempotent: cancelling
/// an already-finished task is a no-op, and dropping the handle cancels it
/// so a reaped room can never tick again.
pub struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// One breakout room: the simulation plus its tick task, if running.
#[derive(Default)]
pub struct BreakoutRoom {
    game: BreakoutGame,
    ticker: Option<Ticker>,
}

impl RoomLife for BreakoutRoom {
    fn is_vacant(&self) -> bool {
        self.game.is_empty()
    }
}

/// What the tick task should do after one step.
enum TickOutcome {
    Continue,
    Stop,
}

/// Breakout engine: room store plus lifecycle handling around the
/// simulation crate. All mutation happens behind the engine lock; the
/// tick task reacquires it every frame.
#[derive(Default)]
pub struct BreakoutEngine {
    rooms: RoomStore<BreakoutRoom>,
}

impl BreakoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to a room, creating it lazily. The newcomer gets the
    /// full state with their id; everyone else gets a state refresh.
    pub fn join(
        &mut self,
        room: &str,
        conn: ConnId,
        sender: ClientSender,
        player_name: &str,
    ) -> Option<PlayerId> {
        let state = self.rooms.get_or_create(room)?;
        let player_id = state.game.add_player(player_name);
        let snapshot = snapshot_or_log(room, &state.game)?;

        self.rooms.attach(room, conn, sender);
        self.rooms.send_to(
            room,
            conn,
            &ServerEvent::PlayerJoined {
                player_id,
                game_state: snapshot.clone(),
            },
        );
        self.rooms.broadcast_except(
            room,
            conn,
            &ServerEvent::GameStateUpdate {
                game_state: snapshot,
            },
        );
        tracing::info!(room, player_name, player_id, "Player joined breakout room");
        Some(player_id)
    }

    /// Start a round. Returns true when a tick task needs to be spawned;
    /// the caller installs it via [`install_ticker`](Self::install_ticker).
    pub fn start(&mut self, room: &str) -> bool {
        let Some(state) = self.rooms.get_mut(room) else {
            return false;
        };
        if !state.game.start() {
            return false;
        }
        let snapshot = snapshot_or_log(room, &state.game);
        self.rooms.broadcast(room, &ServerEvent::GameStarted);
        if let Some(game_state) = snapshot {
            self.rooms
                .broadcast(room, &ServerEvent::GameStateUpdate { game_state });
        }
        true
    }

    pub fn install_ticker(&mut self, room: &str, ticker: Ticker) {
        if let Some(state) = self.rooms.get_mut(room) {
            // Replacing an old ticker drops and cancels it
            state.ticker = Some(ticker);
        }
    }

    /// Stop the tick task and return the room to idle with a fresh grid.
    pub fn reset(&mut self, room: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        state.ticker.take();
        state.game.reset();
        if let Some(game_state) = snapshot_or_log(room, &state.game) {
            self.rooms
                .broadcast(room, &ServerEvent::GameReset { game_state });
        }
    }

    pub fn toggle_pause(&mut self, room: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        if let Some(paused) = state.game.toggle_pause() {
            self.rooms.broadcast(room, &ServerEvent::GamePaused { paused });
        }
    }

    /// Apply an absolute paddle position, clamped by the simulation. The
    /// mover already rendered its own prediction, so only peers hear back.
    pub fn paddle_move(&mut self, room: &str, conn: ConnId, player_id: PlayerId, x: f32) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        if !state.game.move_paddle(player_id, x) {
            return;
        }
        if let Some(game_state) = snapshot_or_log(room, &state.game) {
            self.rooms
                .broadcast_except(room, conn, &ServerEvent::GameStateUpdate { game_state });
        }
    }

    /// Remove a player on disconnect. The last player out stops the tick
    /// task and idles the simulation.
    pub fn leave(&mut self, room: &str, conn: ConnId, player_id: PlayerId) {
        self.rooms.detach(room, conn);
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        if !state.game.remove_player(player_id) {
            return;
        }
        if state.game.is_empty() {
            state.ticker.take();
        }
        let snapshot = snapshot_or_log(room, &state.game);
        self.rooms
            .broadcast(room, &ServerEvent::PlayerLeft { player_id });
        if let Some(game_state) = snapshot {
            self.rooms
                .broadcast(room, &ServerEvent::GameStateUpdate { game_state });
        }
    }

    pub fn reap_idle(&mut self, retention: Duration) -> usize {
        self.rooms.reap_idle(retention)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// One frame: advance physics, broadcast state, and announce terminal
    /// transitions. Pausing keeps the task alive but freezes the world.
    fn tick(&mut self, room: &str) -> TickOutcome {
        let Some(state) = self.rooms.get_mut(room) else {
            return TickOutcome::Stop;
        };
        let end = state.game.step();
        match state.game.phase() {
            Phase::Paused => return TickOutcome::Continue,
            Phase::Idle => return TickOutcome::Stop,
            _ => {},
        }
        if let Some(game_state) = snapshot_or_log(room, &state.game) {
            self.rooms
                .broadcast(room, &ServerEvent::GameStateUpdate { game_state });
        }
        match end {
            Some(GameEnd::Won) => {
                self.rooms.broadcast(room, &ServerEvent::GameWon);
                tracing::info!(room, "Breakout game won");
                TickOutcome::Stop
            },
            Some(GameEnd::Over) => {
                self.rooms.broadcast(room, &ServerEvent::GameOver);
                tracing::info!(room, "Breakout game over");
                TickOutcome::Stop
            },
            None => TickOutcome::Continue,
        }
    }

    fn clear_ticker(&mut self, room: &str) {
        if let Some(state) = self.rooms.get_mut(room) {
            state.ticker.take();
        }
    }

    #[cfg(test)]
    pub fn game(&self, room: &str) -> Option<&BreakoutGame> {
        self.rooms.get(room).map(|s| &s.game)
    }

    #[cfg(test)]
    pub fn game_mut(&mut self, room: &str) -> Option<&mut BreakoutGame> {
        self.rooms.get_mut(room).map(|s| &mut s.game)
    }
}

/// Spawn the 60 Hz tick task for one room. The task holds only the shared
/// engine handle; a missing room on any frame ends it.
pub fn spawn_ticker(shared: SharedBreakout, room: String) -> Ticker {
    let cancel = CancellationToken::new();
    let tick_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick_cancel.cancelled() => break,
                _ = interval.tick() => {
                    let mut engine = shared.write().await;
                    if let TickOutcome::Stop = engine.tick(&room) {
                        engine.clear_ticker(&room);
                        break;
                    }
                }
            }
        }
    });
    Ticker { cancel, handle }
}

fn snapshot_or_log(room: &str, game: &BreakoutGame) -> Option<serde_json::Value> {
    match game.snapshot() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(room, error = %e, "Failed to serialize game state");
            None
        },
    }
}
