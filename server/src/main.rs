use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

/// Main-method of the application.
/// Parses command-line arguments, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    info!(
        "Starting server on {} at {} ticks/s (allowed origin: {})",
        config.address(),
        config.frame_rate,
        config.allowed_origin
    );
    if config.forfeit_on_disconnect {
        info!("Disconnecting players forfeit running games");
    }

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
