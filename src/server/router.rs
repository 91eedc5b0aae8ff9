//! Inbound message routing
//!
//! Turns each frame received on a connection into at most one broadcast.

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use super::protocol::{
    ClientMessage, ServerMessage, SERVER_TIME_SUFFIX, TIMESTAMP_FORMAT, TIME_COMMAND,
};
use super::registry::{ConnectionId, ConnectionRegistry};

/// Decide what, if anything, to broadcast for a parsed client message
pub fn route(message: ClientMessage, now: DateTime<Local>) -> Option<ServerMessage> {
    match message {
        ClientMessage::Chat { message, .. } if message == TIME_COMMAND => Some(
            ServerMessage::chat(format!("{}{}", now.format(TIMESTAMP_FORMAT), SERVER_TIME_SUFFIX)),
        ),
        ClientMessage::Chat { message, device } => match device.filter(|d| !d.is_empty()) {
            Some(device) => Some(ServerMessage::chat(format!("{} (from {})", message, device))),
            None => Some(ServerMessage::chat(message)),
        },
        ClientMessage::Unknown => None,
    }
}

/// Handle one inbound frame from `sender`
///
/// Malformed and unrecognized input is logged and dropped. Returns how many
/// connections the resulting broadcast reached.
pub async fn handle_frame(text: &str, sender: &ConnectionId, registry: &ConnectionRegistry) -> usize {
    let message = match ClientMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Discarding frame from {}: {}", sender, e);
            return 0;
        }
    };
    debug!("Received from {}: {:?}", sender, message);

    let Some(outbound) = route(message, Local::now()) else {
        debug!("Ignoring unrecognized message type from {}", sender);
        return 0;
    };

    match registry.broadcast(&outbound).await {
        Ok(delivered) => delivered,
        Err(e) => {
            warn!("Failed to broadcast message from {}: {}", sender, e);
            0
        }
    }
}
