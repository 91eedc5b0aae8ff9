//! Protocol message definitions
//!
//! Defines the JSON messages exchanged between chat clients and the relay.
//! Every message is an object carrying a `type` discriminator.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Text of the private greeting sent to every new connection
pub const DEFAULT_WELCOME_MESSAGE: &str = "Connected to WebSocket Server!";

/// Chat text that asks the server for its clock instead of an echo
pub const TIME_COMMAND: &str = "time";

/// Appended to the formatted server clock
pub const SERVER_TIME_SUFFIX: &str = " from server";

/// `YYYY-MM-DD HH:MM:SS`, 24-hour
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Error Types
// ============================================================================

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(serde_json::Error),

    #[error("Invalid message: {0}")]
    InvalidMessage(serde_json::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Client Messages
// ============================================================================

/// Messages sent from a client to the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat text to rebroadcast
    Chat {
        message: String,
        /// Optional tag naming the sending device
        #[serde(
            default,
            deserialize_with = "deserialize_device",
            skip_serializing_if = "Option::is_none"
        )]
        device: Option<String>,
    },

    /// Any other `type`; accepted and ignored
    #[serde(other)]
    Unknown,
}

/// Accept any JSON value as a device tag
///
/// Falsy values (`null`, `false`, `0`, `""`) mean no tag. Strings are taken
/// as-is; every other value is rendered as JSON text.
fn deserialize_device<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    })
}

impl ClientMessage {
    /// Create a chat message without a device tag
    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
            device: None,
        }
    }

    /// Create a chat message tagged with the sending device
    pub fn chat_from(message: impl Into<String>, device: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
            device: Some(device.into()),
        }
    }

    /// Parse an inbound frame
    ///
    /// Invalid JSON is [`ProtocolError::Malformed`]. Valid JSON without a
    /// string `type` field parses as [`ClientMessage::Unknown`]. A known
    /// `type` with mismatched fields is [`ProtocolError::InvalidMessage`].
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(json).map_err(ProtocolError::Malformed)?;

        if !matches!(value.get("type"), Some(Value::String(_))) {
            return Ok(Self::Unknown);
        }

        serde_json::from_value(value).map_err(ProtocolError::InvalidMessage)
    }

    /// Serialize the message to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Server Messages
// ============================================================================

/// Messages sent from the relay to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Private greeting for a newly connected client
    Welcome { message: String },

    /// Broadcast chat line
    Chat { message: String },
}

impl ServerMessage {
    /// Create a welcome message
    pub fn welcome(message: impl Into<String>) -> Self {
        Self::Welcome {
            message: message.into(),
        }
    }

    /// Create a chat message
    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
        }
    }

    /// Text carried by the message
    #[cfg(test)]
    pub fn message(&self) -> &str {
        match self {
            Self::Welcome { message } | Self::Chat { message } => message,
        }
    }

    /// Serialize the message to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a server message from JSON
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(ProtocolError::InvalidMessage)
    }
}

// ============================================================================
// Tests
// ============================================================================
