//! Server configuration, parsed from the command line.

use crate::error::ServerError;
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const MAX_FRAME_RATE: u32 = 240;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://127.0.0.1:8080";
pub const DEFAULT_CODE_LENGTH: usize = 5;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(author, version, about = "Authoritative two-player paddle game server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Simulation ticks per second for every running room
    #[arg(short, long, default_value_t = DEFAULT_FRAME_RATE)]
    pub frame_rate: u32,

    /// Origin allowed to open a WebSocket; `*` allows any
    #[arg(long, default_value = DEFAULT_ALLOWED_ORIGIN)]
    pub allowed_origin: String,

    /// Length of generated room codes
    #[arg(long, default_value_t = DEFAULT_CODE_LENGTH)]
    pub code_length: usize,

    /// End a running game when a player disconnects and award it to the other player
    #[arg(long)]
    pub forfeit_on_disconnect: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            frame_rate: DEFAULT_FRAME_RATE,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            code_length: DEFAULT_CODE_LENGTH,
            forfeit_on_disconnect: false,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Time between two ticks of a room's loop.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.frame_rate == 0 || self.frame_rate > MAX_FRAME_RATE {
            return Err(ServerError::Config(format!(
                "frame rate must be between 1 and {}, got {}",
                MAX_FRAME_RATE, self.frame_rate
            )));
        }
        if self.code_length == 0 {
            return Err(ServerError::Config(
                "room code length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a WebSocket handshake carrying `origin` may proceed.
    ///
    /// Requests without an `Origin` header come from non-browser clients and
    /// are always accepted.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allowed_origin == "*" => true,
            Some(origin) => origin.trim_end_matches('/') == self.allowed_origin.trim_end_matches('/'),
        }
    }
}
