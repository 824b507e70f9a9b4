//! Coup game server: one async actor per room behind an axum
//! HTTP/WebSocket API.

mod api;
mod config;
mod logging;

use anyhow::Error;
use coup_engine::room::RoomManager;
use pico_args::Arguments;
use tracing::info;

use config::ServerConfig;

const HELP: &str = "\
Run a Coup game server

USAGE:
  coup_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:3000]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  MAX_ROOMS                Maximum number of live rooms     [default: 1000]
  RUST_LOG                 Log filter (e.g., info, debug)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists.
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    let bind_override = pargs.opt_value_from_str("--bind")?;

    logging::init();
    let config = ServerConfig::from_env(bind_override)?;
    info!("starting Coup server at {}", config.bind);

    let state = api::AppState {
        rooms: RoomManager::new(),
        max_rooms: config.max_rooms,
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        "server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down server");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install CTRL+C handler: {e}");
    }
}
