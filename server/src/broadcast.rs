//! Outbound fan-out to connected sessions
//!
//! Each connection registers a bounded channel whose receiving end is
//! drained by that connection's WebSocket writer task. Delivery is
//! best-effort: sessions that are gone, whose writer has stopped or whose
//! queue is full are skipped.

use crate::session_manager::SessionId;
use log::{debug, error, warn};
use shared::simulation::{GameState, PlayerSlot};
use shared::{GameOver, ServerEvent};
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

/// Events queued per session before further ones are dropped. About two
/// seconds of states at the default frame rate.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Serialized JSON events waiting to be written to a socket.
pub type Outbound = mpsc::Receiver<String>;

pub struct BroadcastGateway {
    senders: RwLock<HashMap<SessionId, mpsc::Sender<String>>>,
    capacity: usize,
}

impl Default for BroadcastGateway {
    fn default() -> Self {
        Self::with_capacity(OUTBOUND_CAPACITY)
    }
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Opens the outbound channel for `session`, replacing any previous one.
    pub async fn register(&self, session: SessionId) -> Outbound {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.write().await.insert(session, tx);
        rx
    }

    /// Closes the outbound channel for `session`; its writer drains what is
    /// already queued and then stops.
    pub async fn unregister(&self, session: SessionId) -> bool {
        self.senders.write().await.remove(&session).is_some()
    }

    /// Sends an event to a single session. Returns whether it was queued.
    pub async fn send_to(&self, session: SessionId, event: &ServerEvent) -> bool {
        match event.to_json() {
            Ok(json) => self.deliver(session, json).await,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.name(), e);
                false
            }
        }
    }

    /// Sends an event to every session in `members`, serializing it once.
    /// Returns how many sessions it was queued for.
    pub async fn broadcast(&self, members: &[SessionId], event: &ServerEvent) -> usize {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.name(), e);
                return 0;
            }
        };

        let senders = self.senders.read().await;
        let mut delivered = 0;
        for session in members {
            if Self::queue(&senders, *session, json.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn broadcast_state(&self, members: &[SessionId], state: &GameState) -> usize {
        self.broadcast(members, &ServerEvent::GameState(state.clone()))
            .await
    }

    pub async fn broadcast_game_over(&self, members: &[SessionId], winner: PlayerSlot) -> usize {
        self.broadcast(members, &ServerEvent::GameOver(GameOver { winner }))
            .await
    }

    async fn deliver(&self, session: SessionId, json: String) -> bool {
        let senders = self.senders.read().await;
        Self::queue(&senders, session, json)
    }

    fn queue(
        senders: &HashMap<SessionId, mpsc::Sender<String>>,
        session: SessionId,
        json: String,
    ) -> bool {
        let Some(tx) = senders.get(&session) else {
            debug!("Session {} is gone, dropping message", session);
            return false;
        };
        match tx.try_send(json) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Session {} is not keeping up, dropping message", session);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Session {} writer has stopped, dropping message", session);
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.senders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.senders.read().await.is_empty()
    }
}
