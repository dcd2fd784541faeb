//! Client event dispatch
//!
//! The lobby is what the network layer talks to: it owns the room registry,
//! the session manager and the broadcast gateway, turns `newGame`,
//! `joinGame` and `keydown` events into operations on them, and starts a
//! room's loop when its second player arrives.

use crate::broadcast::{BroadcastGateway, Outbound};
use crate::config::ServerConfig;
use crate::error::{InputError, JoinError};
use crate::game_loop::start_game_loop;
use crate::room_registry::RoomRegistry;
use crate::session_manager::{SessionId, SessionManager};
use log::{debug, error, info, warn};
use shared::simulation::PlayerSlot;
use shared::{ClientEvent, RawInput, ServerEvent};
use std::sync::Arc;
use std::time::Duration;

pub struct Lobby {
    registry: Arc<RoomRegistry>,
    sessions: SessionManager,
    gateway: Arc<BroadcastGateway>,
    tick_period: Duration,
    forfeit_on_disconnect: bool,
}

impl Lobby {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_registry(config, RoomRegistry::new(config.code_length))
    }

    pub fn with_registry(config: &ServerConfig, registry: RoomRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            sessions: SessionManager::new(),
            gateway: Arc::new(BroadcastGateway::new()),
            tick_period: config.tick_period(),
            forfeit_on_disconnect: config.forfeit_on_disconnect,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Registers a new connection. The returned channel carries every event
    /// addressed to it.
    pub async fn connect(&self) -> (SessionId, Outbound) {
        let session = self.sessions.connect().await;
        let outbound = self.gateway.register(session).await;
        (session, outbound)
    }

    pub async fn handle_event(&self, session: SessionId, event: ClientEvent) {
        match event {
            ClientEvent::NewGame => self.new_game(session).await,
            ClientEvent::JoinGame(code) => self.join_game(session, code.trim()).await,
            ClientEvent::Keydown(raw) => self.keydown(session, &raw).await,
        }
    }

    async fn new_game(&self, session: SessionId) {
        self.leave_current_room(session).await;

        let code = match self.registry.create_room(session).await {
            Ok(code) => code,
            Err(e) => {
                error!("Session {} could not create a room: {}", session, e);
                return;
            }
        };

        self.sessions.bind(session, &code, PlayerSlot::One).await;
        self.gateway
            .send_to(session, &ServerEvent::GameCode(code))
            .await;
        self.gateway
            .send_to(session, &ServerEvent::Init(PlayerSlot::One))
            .await;
    }

    async fn join_game(&self, session: SessionId, code: &str) {
        let joined = match self.registry.join_room(code, session).await {
            Ok(joined) => joined,
            Err(e) => {
                info!("Session {} refused: {}", session, e);
                self.gateway.send_to(session, &e.to_event()).await;
                return;
            }
        };

        self.leave_current_room(session).await;
        if !self.seat(session, code, joined.slot).await {
            info!("Room {} ended before session {} was seated", code, session);
            self.gateway
                .send_to(session, &JoinError::UnknownRoom(code.to_string()).to_event())
                .await;
            return;
        }

        start_game_loop(
            code.to_string(),
            joined.token,
            Arc::clone(&self.registry),
            Arc::clone(&self.gateway),
            self.tick_period,
        );
    }

    /// Binds a freshly joined session and sends its `init`, both under the
    /// room lock. A forfeit ends the room under that same lock, so it either
    /// sees the binding and reaches the session after `init`, or the seat is
    /// already gone and nothing is bound.
    async fn seat(&self, session: SessionId, code: &str, slot: PlayerSlot) -> bool {
        let Some(room) = self.registry.room(code).await else {
            return false;
        };
        let room = room.lock().await;
        if room.is_terminated() || room.slot_of(session) != Some(slot) {
            return false;
        }

        self.sessions.bind(session, code, slot).await;
        self.gateway.send_to(session, &ServerEvent::Init(slot)).await;
        true
    }

    async fn keydown(&self, session: SessionId, raw: &RawInput) {
        match self
            .sessions
            .apply_input(&self.registry, session, raw)
            .await
        {
            Ok(Some(vel)) => debug!("Session {} velocity now ({}, {})", session, vel.x, vel.y),
            Ok(None) => debug!("Session {} sent an unmapped key {:?}", session, raw),
            Err(e @ InputError::MalformedInput(_)) => {
                warn!("Dropping input from session {}: {}", session, e)
            }
            Err(e) => debug!("Ignoring input from session {}: {}", session, e),
        }
    }

    /// Tears down everything belonging to a closed connection.
    pub async fn disconnect(&self, session: SessionId) {
        self.leave_current_room(session).await;
        self.sessions.disconnect(session).await;
        self.gateway.unregister(session).await;
    }

    /// Takes `session` out of the room it is bound to, if any.
    ///
    /// An idle room left empty is cleared. A running room keeps ticking for
    /// the remaining player unless forfeits are enabled, in which case the
    /// remaining player is declared the winner and the room is cleared.
    async fn leave_current_room(&self, session: SessionId) {
        let Some(code) = self.sessions.room_of(session).await else {
            return;
        };
        let departure = if self.forfeit_on_disconnect {
            self.registry.abandon_room(&code, session).await
        } else {
            self.registry.leave_room(&code, session).await
        };
        let Some(departure) = departure else {
            return;
        };

        if departure.ended {
            let winner = departure.slot.other();
            let seated = self
                .sessions
                .release_room(&code, &departure.remaining)
                .await;
            self.gateway.broadcast_game_over(&seated, winner).await;
            info!(
                "Player {} left room {}, player {} wins by forfeit",
                departure.slot, code, winner
            );
        } else if departure.was_running && !departure.remaining.is_empty() {
            info!(
                "Player {} left room {}, game continues for the remaining player",
                departure.slot, code
            );
        }
    }
}
