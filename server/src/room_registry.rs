//! Room ownership and the two-player cardinality rule
//!
//! The registry maps room codes to rooms. Each room sits behind its own async
//! mutex so input events and loop ticks for one room serialize against each
//! other without ever contending with other rooms. The map lock is only held
//! for lookups, inserts and removals, never while a room is locked.

use crate::error::{JoinError, ServerError};
use crate::room_code;
use crate::session_manager::SessionId;
use log::{debug, info};
use shared::simulation::{init_game, GameState, PlayerSlot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Attempts at finding an unused code before `create_room` gives up.
pub const MAX_CODE_ATTEMPTS: usize = 32;

pub type SharedRoom = Arc<Mutex<Room>>;

type CodeGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Where a room is in its single-use lifecycle.
#[derive(Debug)]
pub enum LoopPhase {
    /// Waiting for a second player; no loop exists.
    Idle,
    /// A loop is ticking; cancelling the token stops it.
    Running(CancellationToken),
    Terminated,
}

#[derive(Debug)]
pub struct Room {
    code: String,
    state: Option<GameState>,
    /// Members in join order, each with the slot it was given on entry.
    members: Vec<(SessionId, PlayerSlot)>,
    phase: LoopPhase,
}

impl Room {
    fn new(code: String, creator: SessionId) -> Self {
        Self {
            code,
            state: Some(init_game()),
            members: vec![(creator, PlayerSlot::One)],
            phase: LoopPhase::Idle,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut GameState> {
        self.state.as_mut()
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.members.iter().map(|(session, _)| *session).collect()
    }

    pub fn phase(&self) -> &LoopPhase {
        &self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, LoopPhase::Running(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, LoopPhase::Terminated)
    }

    pub fn slot_of(&self, session: SessionId) -> Option<PlayerSlot> {
        self.members
            .iter()
            .find(|(member, _)| *member == session)
            .map(|(_, slot)| *slot)
    }

    fn contains(&self, session: SessionId) -> bool {
        self.slot_of(session).is_some()
    }

    pub(crate) fn replace_state(&mut self, state: GameState) {
        if self.state.is_some() {
            self.state = Some(state);
        }
    }

    pub(crate) fn remove_session(&mut self, session: SessionId) -> bool {
        let before = self.members.len();
        self.members.retain(|(member, _)| *member != session);
        self.members.len() != before
    }

    /// Drops the simulation state and cancels the loop. Returns whether a
    /// running loop was cancelled by this call; repeated calls are no-ops.
    pub(crate) fn terminate(&mut self) -> bool {
        self.state = None;
        match std::mem::replace(&mut self.phase, LoopPhase::Terminated) {
            LoopPhase::Running(token) => {
                token.cancel();
                true
            }
            LoopPhase::Idle | LoopPhase::Terminated => false,
        }
    }
}

/// A successful join: the slot handed to the joiner and the token that
/// controls the loop which must now be started for the room.
#[derive(Debug)]
pub struct Joined {
    pub slot: PlayerSlot,
    pub token: CancellationToken,
}

/// What is left of a room after one of its members went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub slot: PlayerSlot,
    pub was_running: bool,
    /// The departure ended a running room on the spot.
    pub ended: bool,
    pub remaining: Vec<SessionId>,
}

pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, SharedRoom>>,
    generate_code: CodeGenerator,
}

impl RoomRegistry {
    pub fn new(code_length: usize) -> Self {
        Self::with_code_generator(move || room_code::generate(code_length))
    }

    pub fn with_code_generator<F>(generate_code: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            rooms: RwLock::new(HashMap::new()),
            generate_code: Box::new(generate_code),
        }
    }

    /// Creates a room with `creator` in slot 1 and returns its code.
    pub async fn create_room(&self, creator: SessionId) -> Result<String, ServerError> {
        let mut rooms = self.rooms.write().await;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = (self.generate_code)();
            if rooms.contains_key(&code) {
                debug!("Room code {} already taken, retrying", code);
                continue;
            }

            let room = Room::new(code.clone(), creator);
            rooms.insert(code.clone(), Arc::new(Mutex::new(room)));
            info!("Session {} created room {}", creator, code);
            return Ok(code);
        }

        Err(ServerError::RoomCodeExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Adds `session` to the room as slot 2 and marks the room running.
    ///
    /// Rooms are single-use: a room that has started or finished refuses
    /// further joins even if one of its players has since left.
    pub async fn join_room(&self, code: &str, session: SessionId) -> Result<Joined, JoinError> {
        let room = self
            .room(code)
            .await
            .ok_or_else(|| JoinError::UnknownRoom(code.to_string()))?;
        let mut room = room.lock().await;

        if room.members.is_empty() || room.is_terminated() {
            return Err(JoinError::UnknownRoom(code.to_string()));
        }
        if room.members.len() >= 2 || room.is_running() || room.contains(session) {
            return Err(JoinError::RoomFull(code.to_string()));
        }

        room.members.push((session, PlayerSlot::Two));
        let token = CancellationToken::new();
        room.phase = LoopPhase::Running(token.clone());
        info!("Session {} joined room {}", session, code);

        Ok(Joined {
            slot: PlayerSlot::Two,
            token,
        })
    }

    pub async fn room(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(code).cloned()
    }

    /// A snapshot of the room's current simulation state.
    pub async fn get_state(&self, code: &str) -> Option<GameState> {
        let room = self.room(code).await?;
        let room = room.lock().await;
        room.state().cloned()
    }

    pub async fn members(&self, code: &str) -> Vec<SessionId> {
        let Some(room) = self.room(code).await else {
            return Vec::new();
        };
        let members = room.lock().await.sessions();
        members
    }

    /// Removes the room, dropping its state and cancelling its loop.
    /// Returns false if there was no such room.
    pub async fn clear_room(&self, code: &str) -> bool {
        let removed = self.rooms.write().await.remove(code);
        match removed {
            Some(room) => {
                room.lock().await.terminate();
                info!("Room {} cleared", code);
                true
            }
            None => false,
        }
    }

    /// Takes `session` out of the room's member list. A room left with no
    /// members is cleared.
    pub async fn leave_room(&self, code: &str, session: SessionId) -> Option<Departure> {
        self.depart(code, session, false).await
    }

    /// Like `leave_room`, but a running room that still has a player is
    /// terminated under the same lock and cleared, so nobody can be seated
    /// in it afterwards.
    pub async fn abandon_room(&self, code: &str, session: SessionId) -> Option<Departure> {
        self.depart(code, session, true).await
    }

    async fn depart(&self, code: &str, session: SessionId, end_running: bool) -> Option<Departure> {
        let handle = self.room(code).await?;
        let departure = {
            let mut room = handle.lock().await;
            let slot = room.slot_of(session)?;
            room.remove_session(session);
            let was_running = room.is_running();
            let remaining = room.sessions();
            let ended = end_running && was_running && !remaining.is_empty();
            if ended {
                room.terminate();
            }
            Departure {
                slot,
                was_running,
                ended,
                remaining,
            }
        };

        debug!("Session {} left room {}", session, code);
        if departure.remaining.is_empty() || departure.ended {
            self.remove_if_same(code, &handle).await;
        }
        Some(departure)
    }

    /// Clears `code` only while it still maps to `expected`.
    async fn remove_if_same(&self, code: &str, expected: &SharedRoom) {
        let removed = {
            let mut rooms = self.rooms.write().await;
            let same = rooms
                .get(code)
                .map_or(false, |current| Arc::ptr_eq(current, expected));
            if same {
                rooms.remove(code)
            } else {
                None
            }
        };
        if let Some(room) = removed {
            room.lock().await.terminate();
            info!("Room {} cleared", code);
        }
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}
