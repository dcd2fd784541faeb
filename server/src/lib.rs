//! # Paddle Room Server Library
//!
//! Authoritative server for a two-player paddle game. Clients connect over
//! WebSocket, one of them opens a room and receives a short code, a second
//! client joins with that code, and from then on the server simulates the
//! match at a fixed rate and streams every new state to both players until
//! one of them wins.
//!
//! ## Core Responsibilities
//!
//! ### Room Lifecycle
//! Rooms hold exactly one match. A room is created with its first player,
//! starts running when the second player joins and is destroyed as soon as
//! a winner is known. Rooms are never reused: once started, a room refuses
//! further joins.
//!
//! ### Authoritative Simulation
//! Each running room owns one loop task. The loop advances the shared pure
//! simulation (`shared::simulation`) once per tick, so clients only ever
//! send key presses and render what the server broadcasts.
//!
//! ### Input Handling
//! `keydown` events overwrite the sender's paddle velocity. Inputs that
//! arrive before a tick takes the room lock are visible to that tick; the
//! last write per player wins. Unparseable inputs are logged and dropped.
//!
//! ## Architecture Design
//!
//! ### One Task Per Room
//! Rooms tick independently. A slow room never delays another, and stopping
//! a room means cancelling its token rather than editing a shared schedule.
//!
//! ### Per-Room Locking
//! The server runs on the multi-threaded tokio runtime, so each room sits
//! behind its own async mutex. Input application and ticks for the same room
//! serialize on that mutex; different rooms never contend.
//!
//! ## Module Organization
//!
//! ### Room Registry (`room_registry`)
//! Code-to-room map, the two-player rule and room teardown.
//!
//! ### Session Manager (`session_manager`)
//! Connection ids, their room and slot, and input application.
//!
//! ### Game Loop (`game_loop`)
//! The per-room ticking task and the single-tick function it runs.
//!
//! ### Broadcast Gateway (`broadcast`)
//! Outbound channels per connection and room-wide fan-out.
//!
//! ### Lobby (`lobby`)
//! Turns client events into registry/session operations and starts loops.
//!
//! ### Network (`network`)
//! WebSocket listener, origin check and connection reader/writer tasks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 3000,
//!         frame_rate: 30,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Accepts connections until the listener fails
//!     Server::bind(config).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod lobby;
pub mod network;
pub mod room_code;
pub mod room_registry;
pub mod session_manager;
