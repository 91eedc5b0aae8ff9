//! Chat Relay
//!
//! WebSocket server that accepts JSON chat messages from any client and
//! rebroadcasts them to every connected client, plus a terminal client to
//! talk to it.

mod client;
mod config;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::RelayConfig;
use server::WebSocketServer;

/// Chat Relay
///
/// Real-time JSON message relay over WebSocket
#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server
    Serve(ServeArgs),
    /// Connect to a relay as an interactive terminal client
    Connect(ConnectArgs),
}

#[derive(ClapArgs, Debug)]
struct ServeArgs {
    /// Port to listen on [default: 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long)]
    bind: Option<String>,

    /// Greeting sent to each new client
    #[arg(long)]
    welcome: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct ConnectArgs {
    /// Relay URL
    #[arg(long, default_value = client::DEFAULT_URL)]
    url: String,

    /// Device tag attached to outgoing messages
    #[arg(long, default_value = client::DEFAULT_DEVICE)]
    device: String,

    /// Send messages without a device tag
    #[arg(long, conflicts_with = "device")]
    no_device: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Serve(serve) => run_server(serve).await,
        Command::Connect(connect) => {
            let device = (!connect.no_device).then_some(connect.device);
            client::run(&connect.url, device).await
        }
    }
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    info!("Chat Relay v{}", env!("CARGO_PKG_VERSION"));

    let file_config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            RelayConfig::load(path)?
        }
        None => RelayConfig::default(),
    };
    let cli_config = RelayConfig {
        bind: args.bind,
        port: args.port,
        welcome_message: args.welcome,
    };
    let config = file_config.merge(cli_config).into_server_config();

    // Create and start the WebSocket server
    let server = Arc::new(WebSocketServer::new(config));
    let server_handle = Arc::clone(&server);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        server_handle.shutdown();
    });

    // Run the server
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_args() {
        let args = Args::try_parse_from(["chat-relay", "serve", "--port", "9001", "-v"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Serve(serve) => {
                assert_eq!(serve.port, Some(9001));
                assert!(serve.bind.is_none());
            }
            _ => panic!("Expected serve"),
        }
    }

    #[test]
    fn test_parse_connect_defaults() {
        let args = Args::try_parse_from(["chat-relay", "connect"]).unwrap();
        match args.command {
            Command::Connect(connect) => {
                assert_eq!(connect.url, "ws://localhost:8080");
                assert_eq!(connect.device, "terminal");
                assert!(!connect.no_device);
            }
            _ => panic!("Expected connect"),
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
