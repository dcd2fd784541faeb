//! WebSocket transport: listener, origin policy and per-connection tasks

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::lobby::Lobby;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::ClientEvent;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

/// Accepts WebSocket connections and hands their events to the lobby.
pub struct Server {
    listener: TcpListener,
    lobby: Arc<Lobby>,
    config: Arc<ServerConfig>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            lobby: Arc::new(Lobby::new(&config)),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn lobby(&self) -> Arc<Lobby> {
        Arc::clone(&self.lobby)
    }

    /// Accept loop. Only a failing listener ends it; connection errors are
    /// logged and affect that connection alone.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            debug!("TCP connection from {}", addr);

            let lobby = Arc::clone(&self.lobby);
            let config = Arc::clone(&self.config);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, lobby, config).await {
                    warn!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    lobby: Arc<Lobby>,
    config: Arc<ServerConfig>,
) -> Result<(), ServerError> {
    let check_origin = |request: &Request, response: Response| {
        let origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());

        if config.origin_allowed(origin) {
            Ok(response)
        } else {
            warn!("Rejecting {} from origin {:?}", addr, origin);
            let mut rejection = ErrorResponse::new(Some("origin not allowed".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    };

    let ws_stream = accept_hdr_async(stream, check_origin).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (session, mut outbound) = lobby.connect().await;
    info!("Session {} opened from {}", session, addr);

    let writer = tokio::spawn(async move {
        while let Some(json) = outbound.recv().await {
            if ws_sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientEvent::from_json(&text) {
                Ok(event) => lobby.handle_event(session, event).await,
                Err(e) => warn!("Ignoring unreadable event from session {}: {}", session, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Session {} read error: {}", session, e);
                break;
            }
        }
    }

    lobby.disconnect(session).await;
    let _ = writer.await;
    Ok(())
}
