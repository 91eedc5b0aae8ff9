//! WebSocket server implementation
//!
//! Accepts WebSocket connections, registers each one, greets it privately
//! and relays its chat messages to every connected client.

use std::net::SocketAddr;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::{ServerMessage, DEFAULT_WELCOME_MESSAGE};
use super::registry::{ConnectionId, ConnectionRegistry};
use super::router;

/// Default address to bind to
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default port to listen on
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for the WebSocket server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Greeting sent to each new connection
    pub welcome_message: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BIND.to_string(), DEFAULT_PORT)
    }
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: String, port: u16) -> Self {
        Self {
            bind,
            port,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
        }
    }

    /// Set the welcome text
    pub fn with_welcome_message(mut self, message: impl Into<String>) -> Self {
        self.welcome_message = message.into();
        self
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// WebSocket relay server
pub struct WebSocketServer {
    config: ServerConfig,
    registry: ConnectionRegistry,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            registry: ConnectionRegistry::new(),
            shutdown_tx,
        }
    }

    /// Registry of currently open connections
    #[cfg(test)]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and run the server
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener).await
    }

    /// Run the accept loop on an already bound listener
    ///
    /// Returns once a shutdown signal is received.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("WebSocket server running on ws://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let registry = self.registry.clone();
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            let welcome = ServerMessage::welcome(self.config.welcome_message.clone());

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, registry, welcome, shutdown_rx).await {
                                    error!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                // Handle shutdown signal
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let open = self.registry.len().await;
        if open > 0 {
            info!("Closing {} open connections...", open);
        }

        Ok(())
    }
}

/// Handle a single WebSocket connection from accept to close
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: ConnectionRegistry,
    welcome: ServerMessage,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    // Upgrade to WebSocket
    let ws_stream = accept_async(stream).await?;
    let (ws_sender, mut ws_receiver) = ws_stream.split();

    let id: ConnectionId = Uuid::new_v4();
    info!("New client {} connected from {}", id, peer_addr);

    // The welcome is queued before registration so it is always the first frame
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    tx.send(Message::Text(welcome.to_json()?))?;

    let mut writer = tokio::spawn(run_writer(ws_sender, rx, id, registry.clone()));
    registry.add(id, tx.clone()).await;
    debug!("Queued welcome message for {}", id);

    // Inbound frames are handled one at a time, in arrival order
    let mut writer_done = false;
    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        router::handle_frame(&text, &id, &registry).await;
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            router::handle_frame(text, &id, &registry).await;
                        }
                        Err(e) => {
                            warn!("Discarding non-UTF-8 binary frame from {} ({} bytes): {}", id, data.len(), e);
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data));
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pong messages
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} requested close", id);
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {
                        // Raw frame, ignore
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", id, e);
                        break;
                    }
                    None => {
                        info!("Connection closed by {}", id);
                        break;
                    }
                }
            }
            // Writer stopped on its own: the socket can no longer be written
            _ = &mut writer => {
                warn!("Writer for client {} stopped, closing connection", id);
                writer_done = true;
                break;
            }
            // Handle shutdown signal
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing connection to {}", id);
                let _ = tx.send(Message::Close(None));
                break;
            }
        }
    }

    registry.remove(&id).await;
    drop(tx);
    if !writer_done {
        let _ = writer.await;
    }

    info!("Client {} disconnected", id);
    Ok(())
}

/// Drain a connection's outbound queue into its socket
///
/// Stops after sending a Close frame, once every sender is gone, or on the
/// first failed write. A failed write deregisters the connection at once.
async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<Message>,
    id: ConnectionId,
    registry: ConnectionRegistry,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            error!("Failed to write to client {}: {}", id, e);
            registry.remove(&id).await;
            break;
        }
        if closing {
            break;
        }
    }
    drop(rx);
    let _ = sink.close().await;
}
