//! Named-event wire protocol
//!
//! Every WebSocket text frame carries exactly one JSON object of the form
//! `{"event": "<name>", "data": <payload>}`; events without a payload omit
//! `data`.

use crate::simulation::{GameState, PlayerSlot};
use serde::{Deserialize, Serialize};

/// Events sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    NewGame,
    JoinGame(String),
    Keydown(RawInput),
}

/// The untouched payload of a `keydown` event. Browsers send key codes as
/// numbers or as numeric strings; anything else is kept so the server can
/// log it before dropping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInput {
    Code(i64),
    Text(String),
    Other(serde_json::Value),
}

/// Events sent by the server, either to one client or to a whole room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    GameCode(String),
    Init(PlayerSlot),
    UnknownCode,
    TooManyPlayers,
    GameState(GameState),
    GameOver(GameOver),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOver {
    pub winner: PlayerSlot,
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::GameCode(_) => "gameCode",
            ServerEvent::Init(_) => "init",
            ServerEvent::UnknownCode => "unknownCode",
            ServerEvent::TooManyPlayers => "tooManyPlayers",
            ServerEvent::GameState(_) => "gameState",
            ServerEvent::GameOver(_) => "gameOver",
        }
    }
}
