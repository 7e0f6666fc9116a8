//! Authoritative cooperative breakout simulation. The server owns one
//! [`BreakoutGame`] per room and advances it at 60 Hz; clients only send
//! paddle positions and lifecycle commands.

pub mod layout;
pub mod physics;

use std::collections::BTreeMap;

use serde::Serialize;

use huddle_core::PlayerId;

use crate::layout::{
    Brick, FIELD_WIDTH, PADDLE_BASE_Y, PADDLE_STACK_STEP, PADDLE_WIDTH, PLAYER_PALETTE,
    build_brick_grid,
};
use crate::physics::Ball;

/// Lifecycle of a game. `Won` and `Over` are terminal; only a reset
/// returns the game to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Won,
    Over,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub score: u32,
    pub paddle: Paddle,
}

/// Outcome of a tick that ended the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    Won,
    Over,
}

#[derive(Debug)]
pub struct BreakoutGame {
    phase: Phase,
    players: BTreeMap<PlayerId, Player>,
    balls: Vec<Ball>,
    bricks: Vec<Brick>,
    score: u32,
    next_player_id: PlayerId,
}

impl Default for BreakoutGame {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakoutGame {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            players: BTreeMap::new(),
            balls: Vec::new(),
            bricks: build_brick_grid(),
            score: 0,
            next_player_id: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Add a player with a color from the palette and a paddle stacked
    /// above the existing ones. Returns the assigned id.
    pub fn add_player(&mut self, name: &str) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let slot = self.players.len();
        let color = PLAYER_PALETTE[slot % PLAYER_PALETTE.len()].to_string();
        self.players.insert(
            id,
            Player {
                id,
                name: name.to_string(),
                color,
                score: 0,
                paddle: Paddle {
                    x: FIELD_WIDTH / 2.0 - PADDLE_WIDTH / 2.0,
                    y: PADDLE_BASE_Y - slot as f32 * PADDLE_STACK_STEP,
                },
            },
        );
        id
    }

    /// Remove a player. When the last player leaves the simulation drops
    /// back to idle so an empty room does not keep ticking.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let removed = self.players.remove(&id).is_some();
        if removed && self.players.is_empty() {
            self.balls.clear();
            self.phase = Phase::Idle;
        }
        removed
    }

    /// Move a player's paddle, clamped to the field.
    pub fn move_paddle(&mut self, id: PlayerId, x: f32) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.paddle.x = x.clamp(0.0, FIELD_WIDTH - PADDLE_WIDTH);
                true
            },
            None => false,
        }
    }

    /// Start a fresh round from idle. Ended games must be reset first.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.score = 0;
        for player in self.players.values_mut() {
            player.score = 0;
        }
        for brick in &mut self.bricks {
            brick.destroyed = false;
        }
        self.balls = vec![Ball::launch(rand::random())];
        self.phase = Phase::Running;
        true
    }

    /// Return to idle with a full grid, no balls, and zeroed scores.
    /// Players keep their paddles.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.score = 0;
        self.balls.clear();
        for player in self.players.values_mut() {
            player.score = 0;
        }
        for brick in &mut self.bricks {
            brick.destroyed = false;
        }
    }

    /// Toggle pause. Returns the new paused state, or `None` if the game
    /// is not in a pausable phase.
    pub fn toggle_pause(&mut self) -> Option<bool> {
        match self.phase {
            Phase::Running => {
                self.phase = Phase::Paused;
                Some(true)
            },
            Phase::Paused => {
                self.phase = Phase::Running;
                Some(false)
            },
            _ => None,
        }
    }

    /// Advance the simulation by one tick. Returns the terminal outcome
    /// if this tick ended the game. A cleared grid wins even if the last
    /// ball fell on the same tick.
    pub fn step(&mut self) -> Option<GameEnd> {
        if self.phase != Phase::Running {
            return None;
        }

        let mut ball_idx = 0;
        while ball_idx < self.balls.len() {
            let ball = &mut self.balls[ball_idx];
            ball.step();

            if ball.is_lost() {
                self.balls.remove(ball_idx);
                continue;
            }

            for player in self.players.values() {
                ball.bounce_off_paddle(player.paddle.x, player.paddle.y);
            }

            let ball_x = ball.x;
            let mut hit_points = None;
            for brick in &mut self.bricks {
                if self.balls[ball_idx].hits_brick(brick) {
                    brick.destroyed = true;
                    hit_points = Some(brick.points);
                    break;
                }
            }
            if let Some(points) = hit_points {
                self.score += points;
                self.credit_nearest_player(ball_x, points);
            }

            ball_idx += 1;
        }

        if self.bricks.iter().all(|b| b.destroyed) {
            self.phase = Phase::Won;
            return Some(GameEnd::Won);
        }
        if self.balls.is_empty() {
            self.phase = Phase::Over;
            return Some(GameEnd::Over);
        }
        None
    }

    /// Credit the player whose paddle center is horizontally closest to
    /// where the brick was broken.
    fn credit_nearest_player(&mut self, ball_x: f32, points: u32) {
        let nearest = self
            .players
            .values_mut()
            .min_by(|a, b| {
                let da = (a.paddle.x + PADDLE_WIDTH / 2.0 - ball_x).abs();
                let db = (b.paddle.x + PADDLE_WIDTH / 2.0 - ball_x).abs();
                da.total_cmp(&db)
            });
        if let Some(player) = nearest {
            player.score += points;
        }
    }

    /// Replace the ball list to set up a specific situation in tests.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn set_balls(&mut self, balls: Vec<Ball>) {
        self.balls = balls;
    }

    /// Full state snapshot in the shape clients render.
    pub fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Snapshot<'a> {
            players: &'a BTreeMap<PlayerId, Player>,
            balls: &'a [Ball],
            bricks: &'a [Brick],
            score: u32,
            game_running: bool,
            game_paused: bool,
        }

        serde_json::to_value(Snapshot {
            players: &self.players,
            balls: &self.balls,
            bricks: &self.bricks,
            score: self.score,
            game_running: self.phase == Phase::Running,
            game_paused: self.phase == Phase::Paused,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BALL_RADIUS, BALL_SPEED, FIELD_HEIGHT};

    fn running_game_with_player() -> (BreakoutGame, PlayerId) {
        let mut game = BreakoutGame::new();
        let id = game.add_player("Alice");
        assert!(game.start());
        (game, id)
    }

    #[test]
    fn players_stack_paddles_and_cycle_colors() {
        let mut game = BreakoutGame::new();
        let a = game.add_player("Alice");
        let b = game.add_player("Bob");
        assert_ne!(a, b);

        let snapshot = game.snapshot().unwrap();
        let players = snapshot["players"].as_object().unwrap();
        assert_eq!(players.len(), 2);
        let pa = &players[&a.to_string()];
        let pb = &players[&b.to_string()];
        assert_eq!(pa["paddle"]["y"].as_f64().unwrap(), (FIELD_HEIGHT - 30.0) as f64);
        assert_eq!(
            pb["paddle"]["y"].as_f64().unwrap(),
            (FIELD_HEIGHT - 55.0) as f64
        );
        assert_ne!(pa["color"], pb["color"]);
    }

    #[test]
    fn start_spawns_one_ball_and_runs() {
        let (game, _) = running_game_with_player();
        assert_eq!(game.phase(), Phase::Running);
        let snapshot = game.snapshot().unwrap();
        assert_eq!(snapshot["balls"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["gameRunning"], serde_json::json!(true));
        let dx = snapshot["balls"][0]["dx"].as_f64().unwrap();
        assert_eq!(dx.abs(), BALL_SPEED as f64);
    }

    #[test]
    fn start_is_rejected_while_running_or_ended() {
        let (mut game, _) = running_game_with_player();
        assert!(!game.start());

        game.balls.clear();
        game.balls.push(Ball {
            x: 400.0,
            y: FIELD_HEIGHT + BALL_RADIUS + 1.0,
            dx: 0.0,
            dy: BALL_SPEED,
        });
        assert_eq!(game.step(), Some(GameEnd::Over));
        assert_eq!(game.phase(), Phase::Over);
        assert!(!game.start());

        game.reset();
        assert_eq!(game.phase(), Phase::Idle);
        assert!(game.start());
    }

    #[test]
    fn pause_freezes_the_simulation() {
        let (mut game, _) = running_game_with_player();
        assert_eq!(game.toggle_pause(), Some(true));
        let before = game.snapshot().unwrap();
        assert!(game.step().is_none());
        let after = game.snapshot().unwrap();
        assert_eq!(before["balls"], after["balls"]);
        assert_eq!(after["gamePaused"], serde_json::json!(true));
        assert_eq!(game.toggle_pause(), Some(false));
        assert_eq!(game.phase(), Phase::Running);
    }

    #[test]
    fn pause_is_rejected_when_idle() {
        let mut game = BreakoutGame::new();
        game.add_player("Alice");
        assert_eq!(game.toggle_pause(), None);
    }

    #[test]
    fn brick_hit_credits_shared_and_nearest_player_score() {
        let (mut game, a) = running_game_with_player();
        let b = game.add_player("Bob");
        // Paddle A parked on the left edge, B on the right; drive the
        // ball into the leftmost top brick.
        game.move_paddle(a, 0.0);
        game.move_paddle(b, FIELD_WIDTH - PADDLE_WIDTH);

        let target = game.bricks[0].clone();
        game.balls = vec![Ball {
            x: target.x + 10.0,
            y: target.y + layout::BRICK_HEIGHT + BALL_SPEED,
            dx: 0.0,
            dy: -BALL_SPEED,
        }];
        assert!(game.step().is_none());

        assert!(game.bricks[0].destroyed);
        assert_eq!(game.score(), target.points);
        assert_eq!(game.players[&a].score, target.points);
        assert_eq!(game.players[&b].score, 0);
    }

    #[test]
    fn win_takes_priority_over_simultaneous_ball_loss() {
        let (mut game, _) = running_game_with_player();
        // Grid already cleared while the only ball falls past the floor
        // on the same tick: the team still wins.
        for brick in &mut game.bricks {
            brick.destroyed = true;
        }
        game.balls = vec![Ball {
            x: 400.0,
            y: FIELD_HEIGHT + BALL_RADIUS,
            dx: 0.0,
            dy: BALL_SPEED,
        }];
        assert_eq!(game.step(), Some(GameEnd::Won));
        assert_eq!(game.phase(), Phase::Won);
    }

    #[test]
    fn losing_last_ball_ends_the_game() {
        let (mut game, _) = running_game_with_player();
        game.balls = vec![Ball {
            x: 400.0,
            y: FIELD_HEIGHT + BALL_RADIUS + 1.0,
            dx: 0.0,
            dy: BALL_SPEED,
        }];
        assert_eq!(game.step(), Some(GameEnd::Over));
        let snapshot = game.snapshot().unwrap();
        assert!(snapshot["balls"].as_array().unwrap().is_empty());
        assert_eq!(snapshot["gameRunning"], serde_json::json!(false));
    }

    #[test]
    fn paddle_moves_are_clamped() {
        let mut game = BreakoutGame::new();
        let id = game.add_player("Alice");
        assert!(game.move_paddle(id, -50.0));
        assert_eq!(game.players[&id].paddle.x, 0.0);
        assert!(game.move_paddle(id, 10_000.0));
        assert_eq!(game.players[&id].paddle.x, FIELD_WIDTH - PADDLE_WIDTH);
        assert!(!game.move_paddle(999, 100.0));
    }

    #[test]
    fn last_player_leaving_idles_the_game() {
        let (mut game, id) = running_game_with_player();
        assert!(game.remove_player(id));
        assert!(game.is_empty());
        assert_eq!(game.phase(), Phase::Idle);
        assert!(game.snapshot().unwrap()["balls"].as_array().unwrap().is_empty());
    }

    #[test]
    fn reset_restores_grid_and_scores() {
        let (mut game, a) = running_game_with_player();
        game.bricks[0].destroyed = true;
        game.score = 40;
        if let Some(p) = game.players.get_mut(&a) {
            p.score = 40;
        }
        game.reset();
        assert_eq!(game.phase(), Phase::Idle);
        assert_eq!(game.score(), 0);
        assert!(!game.bricks[0].destroyed);
        assert_eq!(game.players[&a].score, 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ball_never_escapes_side_walls_or_ceiling(
                x in BALL_RADIUS..(FIELD_WIDTH - BALL_RADIUS),
                y in BALL_RADIUS..FIELD_HEIGHT,
                dx in -BALL_SPEED..BALL_SPEED,
                dy in -BALL_SPEED..BALL_SPEED,
                ticks in 1usize..500,
            ) {
                let mut ball = Ball { x, y, dx, dy };
                for _ in 0..ticks {
                    ball.step();
                    prop_assert!(ball.x >= BALL_RADIUS - 1e-3);
                    prop_assert!(ball.x <= FIELD_WIDTH - BALL_RADIUS + 1e-3);
                    prop_assert!(ball.y >= BALL_RADIUS - 1e-3);
                    if ball.is_lost() {
                        break;
                    }
                }
            }

            #[test]
            fn paddle_bounce_always_moves_ball_upward(hit in 0.0f32..=1.0f32) {
                let paddle_x = 350.0;
                let paddle_y = 570.0;
                let mut ball = Ball {
                    x: paddle_x + hit * PADDLE_WIDTH,
                    y: paddle_y,
                    dx: 0.0,
                    dy: BALL_SPEED,
                };
                prop_assert!(ball.bounce_off_paddle(paddle_x, paddle_y));
                prop_assert!(ball.dy <= -physics::MIN_UPWARD_SPEED + 1e-4);
            }
        }
    }
}
