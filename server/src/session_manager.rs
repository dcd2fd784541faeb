//! Connection-to-room bookkeeping and input application
//!
//! Every live connection gets a `SessionId` that is never reused for the
//! lifetime of the process. A session learns its room and slot when it
//! creates or joins a room; `keydown` events are only honoured for sessions
//! that have both.

use crate::error::InputError;
use crate::room_registry::RoomRegistry;
use log::{debug, info};
use shared::simulation::{updated_velocity, PlayerSlot, Vector2};
use shared::RawInput;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub type SessionId = u64;

/// A connection's room membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub room: Option<String>,
    pub slot: Option<PlayerSlot>,
}

pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Session>>,
    next_session_id: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Registers a new connection and returns its id.
    pub async fn connect(&self) -> SessionId {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().await.insert(id, Session::default());
        debug!("Session {} connected", id);
        id
    }

    /// Forgets a connection, returning the membership it had.
    pub async fn disconnect(&self, session: SessionId) -> Option<Session> {
        let removed = self.sessions.write().await.remove(&session);
        if removed.is_some() {
            info!("Session {} disconnected", session);
        }
        removed
    }

    /// Records that `session` plays `slot` in room `code`, replacing any
    /// earlier membership.
    pub async fn bind(&self, session: SessionId, code: &str, slot: PlayerSlot) {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session).or_default();
        entry.room = Some(code.to_string());
        entry.slot = Some(slot);
    }

    /// Unbinds every session in `members` that is still bound to room
    /// `code` and returns those sessions.
    pub async fn release_room(&self, code: &str, members: &[SessionId]) -> Vec<SessionId> {
        let mut sessions = self.sessions.write().await;
        let mut released = Vec::new();
        for member in members {
            if let Some(entry) = sessions.get_mut(member) {
                if entry.room.as_deref() == Some(code) {
                    *entry = Session::default();
                    released.push(*member);
                }
            }
        }
        released
    }

    pub async fn room_of(&self, session: SessionId) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(&session)
            .and_then(|s| s.room.clone())
    }

    pub async fn slot_of(&self, session: SessionId) -> Option<PlayerSlot> {
        self.sessions.read().await.get(&session).and_then(|s| s.slot)
    }

    async fn membership(&self, session: SessionId) -> Option<(String, PlayerSlot)> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&session)?;
        Some((entry.room.clone()?, entry.slot?))
    }

    /// Applies a `keydown` payload to the session's paddle.
    ///
    /// Returns the velocity that was written, or `None` when the key code is
    /// not one the game reacts to.
    pub async fn apply_input(
        &self,
        registry: &RoomRegistry,
        session: SessionId,
        raw: &RawInput,
    ) -> Result<Option<Vector2>, InputError> {
        let (code, slot) = self
            .membership(session)
            .await
            .ok_or(InputError::NotInRoom(session))?;
        let key_code = parse_input_code(raw)?;

        let Some(vel) = updated_velocity(key_code) else {
            return Ok(None);
        };

        let room = registry
            .room(&code)
            .await
            .ok_or_else(|| InputError::RoomGone(code.clone()))?;
        let mut room = room.lock().await;
        // A binding can outlive its room; the code may since belong to a new one.
        if room.slot_of(session) != Some(slot) {
            return Err(InputError::NotInRoom(session));
        }
        let state = room
            .state_mut()
            .ok_or_else(|| InputError::RoomGone(code.clone()))?;
        state.set_velocity(slot, vel);

        Ok(Some(vel))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Reads an integer key code from a `keydown` payload. Numeric strings are
/// accepted with surrounding whitespace.
pub fn parse_input_code(raw: &RawInput) -> Result<i64, InputError> {
    match raw {
        RawInput::Code(code) => Ok(*code),
        RawInput::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| InputError::MalformedInput(raw.clone())),
        RawInput::Other(_) => Err(InputError::MalformedInput(raw.clone())),
    }
}
