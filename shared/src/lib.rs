//! Types shared between the paddle server and its clients: the JSON event
//! protocol and the pure per-tick simulation.

pub mod protocol;
pub mod simulation;

pub use protocol::{ClientEvent, GameOver, RawInput, ServerEvent};
pub use simulation::{
    game_loop, init_game, updated_velocity, Ball, GameState, Paddle, PlayerSlot, TickOutcome,
    Vector2,
};

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const PADDLE_WIDTH: f32 = 12.0;
pub const PADDLE_HEIGHT: f32 = 96.0;
/// Horizontal gap between a paddle and its own goal line.
pub const PADDLE_MARGIN: f32 = 24.0;
/// Paddle speed in pixels per tick.
pub const PADDLE_SPEED: f32 = 9.0;
pub const BALL_RADIUS: f32 = 8.0;
/// Horizontal ball speed in pixels per tick.
pub const BALL_SPEED: f32 = 7.0;
/// Largest vertical speed a paddle edge hit can put on the ball.
pub const MAX_DEFLECTION: f32 = 6.0;
pub const WINNING_SCORE: u32 = 3;

pub const KEY_SPACE: i64 = 32;
pub const KEY_UP: i64 = 38;
pub const KEY_DOWN: i64 = 40;
pub const KEY_S: i64 = 83;
pub const KEY_W: i64 = 87;
