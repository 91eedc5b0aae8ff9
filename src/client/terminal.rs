//! Interactive terminal session against a relay server

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::server::{ClientMessage, ServerMessage};

/// Default relay address for `connect`
pub const DEFAULT_URL: &str = "ws://localhost:8080";

/// Default device tag attached to outgoing messages
pub const DEFAULT_DEVICE: &str = "terminal";

/// Format a received frame for display
///
/// Returns `None` for text that is not JSON at all.
pub fn render(text: &str) -> Option<String> {
    if let Ok(message) = ServerMessage::from_json(text) {
        return Some(match message {
            ServerMessage::Welcome { message } => format!("👋 {}", message),
            ServerMessage::Chat { message } => format!("💬 {}", message),
        });
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .map(|value| value.to_string())
}

/// Build the outgoing message for one line of input
///
/// Blank lines produce nothing.
pub fn outgoing(line: &str, device: Option<&str>) -> Option<ClientMessage> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    Some(match device {
        Some(device) => ClientMessage::chat_from(line, device),
        None => ClientMessage::chat(line),
    })
}

/// Run an interactive session until stdin closes or the server hangs up
pub async fn run(url: &str, device: Option<String>) -> anyhow::Result<()> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("Connected to {}", url);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match render(&text) {
                        Some(line) => println!("{}", line),
                        None => warn!("Unparsable frame from server: {}", text),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(other)) => {
                        debug!("Ignoring non-text frame: {:?}", other);
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if let Some(message) = outgoing(&line, device.as_deref()) {
                            ws_sender.send(Message::Text(message.to_json()?)).await?;
                        }
                    }
                    None => {
                        debug!("stdin closed");
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    info!("Disconnected");
    Ok(())
}
