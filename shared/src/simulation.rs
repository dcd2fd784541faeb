//! Pure paddle-game simulation
//!
//! `game_loop` advances a state by exactly one tick and either returns the
//! next state or the slot that won the round. Nothing in here touches the
//! network or the clock, so the server can call it from any room's loop and
//! the tests can drive it tick by tick.

use crate::{
    BALL_RADIUS, BALL_SPEED, KEY_DOWN, KEY_S, KEY_SPACE, KEY_UP, KEY_W, MAX_DEFLECTION,
    PADDLE_HEIGHT, PADDLE_MARGIN, PADDLE_SPEED, PADDLE_WIDTH, WINNING_SCORE, WORLD_HEIGHT,
    WORLD_WIDTH,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which side of the field a player controls. Serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    /// Index into the two-element player arrays of `GameState`.
    pub fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    pub fn other(self) -> PlayerSlot {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }
}

impl From<PlayerSlot> for u8 {
    fn from(slot: PlayerSlot) -> u8 {
        match slot {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid player slot {0}, expected 1 or 2")]
pub struct InvalidSlot(pub u8);

impl TryFrom<u8> for PlayerSlot {
    type Error = InvalidSlot;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PlayerSlot::One),
            2 => Ok(PlayerSlot::Two),
            other => Err(InvalidSlot(other)),
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A paddle; `pos` is its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub pos: Vector2,
    pub vel: Vector2,
}

impl Paddle {
    fn new(x: f32) -> Self {
        Self {
            pos: Vector2::new(x, (WORLD_HEIGHT - PADDLE_HEIGHT) / 2.0),
            vel: Vector2::ZERO,
        }
    }

    pub fn center_y(&self) -> f32 {
        self.pos.y + PADDLE_HEIGHT / 2.0
    }

    fn touches(&self, ball: &Ball) -> bool {
        ball.pos.x + BALL_RADIUS >= self.pos.x
            && ball.pos.x - BALL_RADIUS <= self.pos.x + PADDLE_WIDTH
            && ball.pos.y + BALL_RADIUS >= self.pos.y
            && ball.pos.y - BALL_RADIUS <= self.pos.y + PADDLE_HEIGHT
    }
}

/// The ball; `pos` is its center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub pos: Vector2,
    pub vel: Vector2,
}

impl Ball {
    /// A ball at the center of the field heading toward `receiver`.
    fn serve_toward(receiver: PlayerSlot, rally: u32) -> Self {
        let dir_x = match receiver {
            PlayerSlot::One => -1.0,
            PlayerSlot::Two => 1.0,
        };
        // Alternate the vertical direction so consecutive serves differ.
        let dir_y = if rally % 2 == 0 { 1.0 } else { -1.0 };
        Self {
            pos: Vector2::new(WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0),
            vel: Vector2::new(dir_x * BALL_SPEED, dir_y * BALL_SPEED / 2.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub tick: u32,
    pub players: [Paddle; 2],
    pub ball: Ball,
    pub scores: [u32; 2],
}

impl GameState {
    pub fn player(&self, slot: PlayerSlot) -> &Paddle {
        &self.players[slot.index()]
    }

    pub fn set_velocity(&mut self, slot: PlayerSlot, vel: Vector2) {
        self.players[slot.index()].vel = vel;
    }

    fn total_points(&self) -> u32 {
        self.scores[0] + self.scores[1]
    }
}

/// Result of advancing one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Continue(GameState),
    Winner(PlayerSlot),
}

/// Fresh state for a new room: paddles centered, ball served toward player 2.
pub fn init_game() -> GameState {
    GameState {
        tick: 0,
        players: [
            Paddle::new(PADDLE_MARGIN),
            Paddle::new(WORLD_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH),
        ],
        ball: Ball::serve_toward(PlayerSlot::Two, 0),
        scores: [0, 0],
    }
}

/// Maps a browser key code to a paddle velocity. Unknown keys yield `None`.
pub fn updated_velocity(key_code: i64) -> Option<Vector2> {
    match key_code {
        KEY_UP | KEY_W => Some(Vector2::new(0.0, -PADDLE_SPEED)),
        KEY_DOWN | KEY_S => Some(Vector2::new(0.0, PADDLE_SPEED)),
        KEY_SPACE => Some(Vector2::ZERO),
        _ => None,
    }
}

/// Advances `state` by one tick.
pub fn game_loop(state: &GameState) -> TickOutcome {
    let mut next = state.clone();
    next.tick = next.tick.wrapping_add(1);

    for paddle in next.players.iter_mut() {
        paddle.pos.x += paddle.vel.x;
        paddle.pos.y = (paddle.pos.y + paddle.vel.y).clamp(0.0, WORLD_HEIGHT - PADDLE_HEIGHT);
    }

    let ball = &mut next.ball;
    ball.pos.x += ball.vel.x;
    ball.pos.y += ball.vel.y;

    if ball.pos.y - BALL_RADIUS <= 0.0 {
        ball.pos.y = BALL_RADIUS;
        ball.vel.y = ball.vel.y.abs();
    } else if ball.pos.y + BALL_RADIUS >= WORLD_HEIGHT {
        ball.pos.y = WORLD_HEIGHT - BALL_RADIUS;
        ball.vel.y = -ball.vel.y.abs();
    }

    let [left, right] = &next.players;
    if ball.vel.x < 0.0 && left.touches(ball) {
        deflect(ball, left, 1.0);
        ball.pos.x = left.pos.x + PADDLE_WIDTH + BALL_RADIUS;
    } else if ball.vel.x > 0.0 && right.touches(ball) {
        deflect(ball, right, -1.0);
        ball.pos.x = right.pos.x - BALL_RADIUS;
    }

    let scorer = if ball.pos.x + BALL_RADIUS < 0.0 {
        Some(PlayerSlot::Two)
    } else if ball.pos.x - BALL_RADIUS > WORLD_WIDTH {
        Some(PlayerSlot::One)
    } else {
        None
    };

    if let Some(scorer) = scorer {
        next.scores[scorer.index()] += 1;
        if next.scores[scorer.index()] >= WINNING_SCORE {
            return TickOutcome::Winner(scorer);
        }
        let rally = next.total_points();
        next.ball = Ball::serve_toward(scorer.other(), rally);
    }

    TickOutcome::Continue(next)
}

/// Sends the ball back in `dir_x`, steering it by where it hit the paddle.
fn deflect(ball: &mut Ball, paddle: &Paddle, dir_x: f32) {
    let offset = ((ball.pos.y - paddle.center_y()) / (PADDLE_HEIGHT / 2.0)).clamp(-1.0, 1.0);
    ball.vel.x = dir_x * BALL_SPEED;
    ball.vel.y = offset * MAX_DEFLECTION;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn advance(state: &GameState) -> GameState {
        match game_loop(state) {
            TickOutcome::Continue(next) => next,
            TickOutcome::Winner(slot) => panic!("unexpected winner {}", slot),
        }
    }

    #[test]
    fn test_init_game_layout() {
        let state = init_game();
        assert_eq!(state.tick, 0);
        assert_eq!(state.scores, [0, 0]);
        assert_eq!(state.players[0].vel, Vector2::ZERO);
        assert_eq!(state.players[1].vel, Vector2::ZERO);
        assert!(state.players[0].pos.x < state.players[1].pos.x);
        assert_approx_eq!(state.players[0].center_y(), WORLD_HEIGHT / 2.0);
        assert_approx_eq!(state.ball.pos.x, WORLD_WIDTH / 2.0);
        assert!(state.ball.vel.x > 0.0);
    }

    #[test]
    fn test_updated_velocity_mapping() {
        assert_eq!(updated_velocity(KEY_UP), Some(Vector2::new(0.0, -PADDLE_SPEED)));
        assert_eq!(updated_velocity(KEY_W), Some(Vector2::new(0.0, -PADDLE_SPEED)));
        assert_eq!(updated_velocity(KEY_DOWN), Some(Vector2::new(0.0, PADDLE_SPEED)));
        assert_eq!(updated_velocity(KEY_S), Some(Vector2::new(0.0, PADDLE_SPEED)));
        assert_eq!(updated_velocity(KEY_SPACE), Some(Vector2::ZERO));
        assert_eq!(updated_velocity(13), None);
        assert_eq!(updated_velocity(-1), None);
    }

    #[test]
    fn test_tick_moves_paddle_and_ball() {
        let mut state = init_game();
        state.set_velocity(PlayerSlot::One, Vector2::new(0.0, PADDLE_SPEED));
        let before = state.clone();

        let next = advance(&state);

        assert_eq!(next.tick, 1);
        assert_approx_eq!(next.players[0].pos.y, before.players[0].pos.y + PADDLE_SPEED);
        assert_approx_eq!(next.players[1].pos.y, before.players[1].pos.y);
        assert_approx_eq!(next.ball.pos.x, before.ball.pos.x + BALL_SPEED);
    }

    #[test]
    fn test_paddle_clamped_to_field() {
        let mut state = init_game();
        state.players[1].pos.y = 2.0;
        state.set_velocity(PlayerSlot::Two, Vector2::new(0.0, -PADDLE_SPEED));

        let next = advance(&state);
        assert_approx_eq!(next.players[1].pos.y, 0.0);

        let mut state = init_game();
        state.players[0].pos.y = WORLD_HEIGHT - PADDLE_HEIGHT - 1.0;
        state.set_velocity(PlayerSlot::One, Vector2::new(0.0, PADDLE_SPEED));

        let next = advance(&state);
        assert_approx_eq!(next.players[0].pos.y, WORLD_HEIGHT - PADDLE_HEIGHT);
    }

    #[test]
    fn test_ball_bounces_off_top_wall() {
        let mut state = init_game();
        state.ball.pos = Vector2::new(WORLD_WIDTH / 2.0, BALL_RADIUS + 1.0);
        state.ball.vel = Vector2::new(BALL_SPEED, -3.0);

        let next = advance(&state);
        assert!(next.ball.vel.y > 0.0);
        assert_approx_eq!(next.ball.pos.y, BALL_RADIUS);
    }

    #[test]
    fn test_ball_deflects_off_left_paddle() {
        let mut state = init_game();
        let paddle = &state.players[0];
        state.ball.pos = Vector2::new(
            paddle.pos.x + PADDLE_WIDTH + BALL_RADIUS + 2.0,
            paddle.center_y(),
        );
        state.ball.vel = Vector2::new(-BALL_SPEED, 0.0);

        let next = advance(&state);
        assert_approx_eq!(next.ball.vel.x, BALL_SPEED);
        assert_approx_eq!(next.ball.vel.y, 0.0);
        assert!(next.ball.pos.x >= next.players[0].pos.x + PADDLE_WIDTH);
    }

    #[test]
    fn test_edge_hit_steers_ball() {
        let mut state = init_game();
        let paddle = &state.players[1];
        state.ball.pos = Vector2::new(paddle.pos.x - BALL_RADIUS - 1.0, paddle.pos.y);
        state.ball.vel = Vector2::new(BALL_SPEED, 0.0);

        let next = advance(&state);
        assert_approx_eq!(next.ball.vel.x, -BALL_SPEED);
        assert_approx_eq!(next.ball.vel.y, -MAX_DEFLECTION);
    }

    #[test]
    fn test_point_scored_serves_toward_conceding_player() {
        let mut state = init_game();
        state.players[1].pos.y = 0.0;
        state.ball.pos = Vector2::new(WORLD_WIDTH + BALL_RADIUS - 2.0, WORLD_HEIGHT - 50.0);
        state.ball.vel = Vector2::new(BALL_SPEED, 0.0);

        let next = advance(&state);
        assert_eq!(next.scores, [1, 0]);
        assert_approx_eq!(next.ball.pos.x, WORLD_WIDTH / 2.0);
        assert!(next.ball.vel.x > 0.0);
    }

    #[test]
    fn test_winner_reported_at_winning_score() {
        let mut state = init_game();
        state.scores = [0, WINNING_SCORE - 1];
        state.players[0].pos.y = 0.0;
        state.ball.pos = Vector2::new(-BALL_RADIUS + 2.0, WORLD_HEIGHT - 50.0);
        state.ball.vel = Vector2::new(-BALL_SPEED, 0.0);

        assert_eq!(game_loop(&state), TickOutcome::Winner(PlayerSlot::Two));
    }

    #[test]
    fn test_game_loop_does_not_mutate_input() {
        let state = init_game();
        let copy = state.clone();
        let _ = game_loop(&state);
        assert_eq!(state, copy);
    }

    #[test]
    fn test_unattended_game_eventually_ends() {
        let mut state = init_game();
        for _ in 0..100_000 {
            match game_loop(&state) {
                TickOutcome::Continue(next) => state = next,
                TickOutcome::Winner(_) => return,
            }
        }
        panic!("no winner after 100000 ticks");
    }

    #[test]
    fn test_player_slot_conversions() {
        assert_eq!(u8::from(PlayerSlot::One), 1);
        assert_eq!(u8::from(PlayerSlot::Two), 2);
        assert_eq!(PlayerSlot::try_from(2), Ok(PlayerSlot::Two));
        assert_eq!(PlayerSlot::try_from(3), Err(InvalidSlot(3)));
        let err: Box<dyn std::error::Error> = Box::new(InvalidSlot(3));
        assert_eq!(err.to_string(), "invalid player slot 3, expected 1 or 2");
        assert_eq!(PlayerSlot::One.other(), PlayerSlot::Two);
        assert_eq!(PlayerSlot::Two.index(), 1);
    }
}
