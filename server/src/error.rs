//! Error types for the room server
//!
//! Join failures and malformed input are expected during normal play and are
//! resolved where they are detected: join failures become a named response
//! event, input failures are logged and dropped. `ServerError` covers
//! everything that can end a connection or stop the listener.

use crate::session_manager::SessionId;
use shared::{RawInput, ServerEvent};
use thiserror::Error;

/// Why a `joinGame` request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("no room with code {0}")]
    UnknownRoom(String),
    #[error("room {0} already has two players")]
    RoomFull(String),
}

impl JoinError {
    /// The event sent back to the client that asked to join.
    pub fn to_event(&self) -> ServerEvent {
        match self {
            JoinError::UnknownRoom(_) => ServerEvent::UnknownCode,
            JoinError::RoomFull(_) => ServerEvent::TooManyPlayers,
        }
    }
}

/// Why a `keydown` event was not applied. Never sent to the client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("session {0} is not in a room")]
    NotInRoom(SessionId),
    #[error("room {0} no longer has a running game")]
    RoomGone(String),
    #[error("malformed input code {0:?}")]
    MalformedInput(RawInput),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("could not generate a unique room code after {0} attempts")]
    RoomCodeExhausted(usize),
    #[error("invalid configuration: {0}")]
    Config(String),
}
