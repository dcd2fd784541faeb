//! Headless bot for smoke-testing a running server. Without `--join` it
//! opens a new room and prints the code; with `--join CODE` it joins that
//! room. Either way it then tracks the ball with its paddle until the game
//! ends.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::simulation::{GameState, PlayerSlot};
use shared::{ClientEvent, RawInput, ServerEvent, KEY_DOWN, KEY_SPACE, KEY_UP};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Join an existing room instead of creating one
    #[arg(short, long)]
    join: Option<String>,
}

/// Key that moves `slot`'s paddle toward the ball.
fn chase_ball(state: &GameState, slot: PlayerSlot) -> i64 {
    let paddle_y = state.player(slot).center_y();
    let ball_y = state.ball.pos.y;
    if ball_y < paddle_y - 10.0 {
        KEY_UP
    } else if ball_y > paddle_y + 10.0 {
        KEY_DOWN
    } else {
        KEY_SPACE
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    println!("Connected to {}", args.server);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let request = match args.join {
        Some(code) => ClientEvent::JoinGame(code),
        None => ClientEvent::NewGame,
    };
    ws_sender.send(Message::Text(request.to_json()?)).await?;

    let mut slot = None;
    let mut last_key = None;

    while let Some(message) = ws_receiver.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match ServerEvent::from_json(&text)? {
            ServerEvent::GameCode(code) => println!("Room code: {}", code),
            ServerEvent::Init(assigned) => {
                println!("Playing as player {}", assigned);
                slot = Some(assigned);
            }
            ServerEvent::UnknownCode => {
                println!("No such room");
                break;
            }
            ServerEvent::TooManyPlayers => {
                println!("Room is full");
                break;
            }
            ServerEvent::GameState(state) => {
                if state.tick % 30 == 0 {
                    println!(
                        "tick {}: score {}-{}, ball at ({:.0}, {:.0})",
                        state.tick, state.scores[0], state.scores[1], state.ball.pos.x, state.ball.pos.y
                    );
                }
                if let Some(slot) = slot {
                    let key = chase_ball(&state, slot);
                    if last_key != Some(key) {
                        let input = ClientEvent::Keydown(RawInput::Code(key));
                        ws_sender.send(Message::Text(input.to_json()?)).await?;
                        last_key = Some(key);
                    }
                }
            }
            ServerEvent::GameOver(over) => {
                println!("Game over, player {} wins", over.winner);
                break;
            }
        }
    }

    let _ = ws_sender.close().await;
    println!("Test client finished");
    Ok(())
}
