//! Per-room fixed-rate game loop
//!
//! Every running room gets its own task ticking at the configured period.
//! A tick re-fetches the room from the registry, advances the simulation
//! under the room's lock and broadcasts the result. When the simulation
//! reports a winner the loop broadcasts `gameOver`, clears the room and
//! cancels its own token, so nothing scheduled afterwards runs.
//!
//! Cancellation can also come from outside (`RoomRegistry::clear_room`, a
//! forfeit on disconnect); the token is checked before and after taking the
//! room lock, so a tick that was already waiting never touches a cleared
//! room.

use crate::broadcast::BroadcastGateway;
use crate::room_registry::RoomRegistry;
use log::{debug, info};
use shared::simulation::{self, TickOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Starts the loop for room `code`. The room must already be marked running
/// with `token`.
pub fn start_game_loop(
    code: String,
    token: CancellationToken,
    registry: Arc<RoomRegistry>,
    gateway: Arc<BroadcastGateway>,
    tick_period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_game_loop(&code, &token, &registry, &gateway, tick_period).await;
    })
}

async fn run_game_loop(
    code: &str,
    token: &CancellationToken,
    registry: &RoomRegistry,
    gateway: &BroadcastGateway,
    tick_period: Duration,
) {
    let mut interval_timer = interval(tick_period);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    interval_timer.tick().await;

    info!("Game loop started for room {} ({:?} per tick)", code, tick_period);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval_timer.tick() => {}
        }

        if run_tick(code, token, registry, gateway).await == TickControl::Stop {
            break;
        }
    }

    debug!("Game loop for room {} stopped", code);
}

/// Advances room `code` by one tick.
pub async fn run_tick(
    code: &str,
    token: &CancellationToken,
    registry: &RoomRegistry,
    gateway: &BroadcastGateway,
) -> TickControl {
    if token.is_cancelled() {
        return TickControl::Stop;
    }

    let Some(room) = registry.room(code).await else {
        token.cancel();
        return TickControl::Stop;
    };
    let mut room = room.lock().await;

    if token.is_cancelled() || !room.is_running() {
        return TickControl::Stop;
    }
    let Some(state) = room.state() else {
        return TickControl::Stop;
    };

    let members = room.sessions();
    match simulation::game_loop(state) {
        TickOutcome::Continue(next) => {
            // Broadcast while still holding the lock so a concurrent
            // termination can never be overtaken by a stale state.
            gateway.broadcast_state(&members, &next).await;
            room.replace_state(next);
            TickControl::Continue
        }
        TickOutcome::Winner(winner) => {
            room.terminate();
            gateway.broadcast_game_over(&members, winner).await;
            drop(room);

            info!("Room {} finished, player {} wins", code, winner);
            registry.clear_room(code).await;
            TickControl::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Outbound;
    use crate::error::{InputError, JoinError};
    use crate::session_manager::SessionManager;
    use shared::simulation::{PlayerSlot, Vector2};
    use shared::{
        RawInput, ServerEvent, BALL_RADIUS, BALL_SPEED, KEY_UP, WINNING_SCORE, WORLD_HEIGHT,
    };

    struct Fixture {
        registry: Arc<RoomRegistry>,
        gateway: Arc<BroadcastGateway>,
        code: String,
        token: CancellationToken,
        outbound: [Outbound; 2],
    }

    async fn running_room() -> Fixture {
        let registry = Arc::new(RoomRegistry::with_code_generator(|| "ABCDE".to_string()));
        let gateway = Arc::new(BroadcastGateway::new());
        let code = registry.create_room(1).await.unwrap();
        let joined = registry.join_room(&code, 2).await.unwrap();
        let outbound = [gateway.register(1).await, gateway.register(2).await];

        Fixture {
            registry,
            gateway,
            code,
            token: joined.token,
            outbound,
        }
    }

    /// Puts the ball one tick away from giving player 2 the winning point.
    async fn set_match_point(fixture: &Fixture) {
        let room = fixture.registry.room(&fixture.code).await.unwrap();
        let mut room = room.lock().await;
        let state = room.state_mut().unwrap();
        state.scores = [0, WINNING_SCORE - 1];
        state.players[0].pos.y = 0.0;
        state.ball.pos = Vector2::new(-BALL_RADIUS + 1.0, WORLD_HEIGHT - 40.0);
        state.ball.vel = Vector2::new(-BALL_SPEED, 0.0);
    }

    fn drain(rx: &mut Outbound) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(json) = rx.try_recv() {
            events.push(ServerEvent::from_json(&json).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_tick_advances_and_broadcasts() {
        let mut f = running_room().await;

        let control = run_tick(&f.code, &f.token, &f.registry, &f.gateway).await;
        assert_eq!(control, TickControl::Continue);

        let state = f.registry.get_state(&f.code).await.unwrap();
        assert_eq!(state.tick, 1);
        for rx in f.outbound.iter_mut() {
            let events = drain(rx);
            assert_eq!(events, vec![ServerEvent::GameState(state.clone())]);
        }
    }

    #[tokio::test]
    async fn test_winner_terminates_room() {
        let mut f = running_room().await;
        set_match_point(&f).await;

        let control = run_tick(&f.code, &f.token, &f.registry, &f.gateway).await;
        assert_eq!(control, TickControl::Stop);
        assert!(f.token.is_cancelled());
        assert!(f.registry.get_state(&f.code).await.is_none());
        assert_eq!(
            f.registry.join_room(&f.code, 3).await.unwrap_err(),
            JoinError::UnknownRoom(f.code.clone())
        );

        for rx in f.outbound.iter_mut() {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert!(matches!(
                &events[0],
                ServerEvent::GameOver(over) if over.winner == PlayerSlot::Two
            ));
        }

        let again = run_tick(&f.code, &f.token, &f.registry, &f.gateway).await;
        assert_eq!(again, TickControl::Stop);
        assert!(drain(&mut f.outbound[0]).is_empty());
    }

    #[tokio::test]
    async fn test_finished_room_members_cannot_touch_next_room() {
        let f = running_room().await;
        let sessions = SessionManager::new();
        sessions.bind(1, &f.code, PlayerSlot::One).await;
        set_match_point(&f).await;
        assert_eq!(
            run_tick(&f.code, &f.token, &f.registry, &f.gateway).await,
            TickControl::Stop
        );

        assert_eq!(f.registry.create_room(3).await.unwrap(), f.code);
        let before = f.registry.get_state(&f.code).await.unwrap();

        let err = sessions
            .apply_input(&f.registry, 1, &RawInput::Code(KEY_UP))
            .await
            .unwrap_err();
        assert_eq!(err, InputError::NotInRoom(1));
        assert_eq!(f.registry.get_state(&f.code).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_tick() {
        let mut f = running_room().await;
        f.token.cancel();

        let control = run_tick(&f.code, &f.token, &f.registry, &f.gateway).await;
        assert_eq!(control, TickControl::Stop);
        assert_eq!(f.registry.get_state(&f.code).await.unwrap().tick, 0);
        assert!(drain(&mut f.outbound[0]).is_empty());
    }

    #[tokio::test]
    async fn test_idle_room_never_ticks() {
        let registry = RoomRegistry::new(5);
        let gateway = BroadcastGateway::new();
        let code = registry.create_room(1).await.unwrap();
        let mut rx = gateway.register(1).await;

        let control = run_tick(&code, &CancellationToken::new(), &registry, &gateway).await;
        assert_eq!(control, TickControl::Stop);
        assert_eq!(registry.get_state(&code).await.unwrap().tick, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_at_configured_period() {
        let mut f = running_room().await;
        let handle = start_game_loop(
            f.code.clone(),
            f.token.clone(),
            Arc::clone(&f.registry),
            Arc::clone(&f.gateway),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(55)).await;
        let ticks = f.registry.get_state(&f.code).await.unwrap().tick;
        assert!((4..=6).contains(&ticks), "unexpected tick count {}", ticks);

        let events = drain(&mut f.outbound[1]);
        assert_eq!(events.len() as u32, ticks);
        assert!(events.iter().all(|e| e.name() == "gameState"));

        f.registry.clear_room(&f.code).await;
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_after_winner() {
        let mut f = running_room().await;
        set_match_point(&f).await;

        let handle = start_game_loop(
            f.code.clone(),
            f.token.clone(),
            Arc::clone(&f.registry),
            Arc::clone(&f.gateway),
            Duration::from_millis(10),
        );
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let events = drain(&mut f.outbound[0]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "gameOver");
        assert!(f.registry.is_empty().await);
    }
}
