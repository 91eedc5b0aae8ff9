//! Relay configuration file
//!
//! Every key is optional; anything left out falls back to the command line
//! or the built-in default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::server::ServerConfig;

/// Errors that can occur while loading the config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Contents of the relay config file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// Greeting sent to each new connection
    pub welcome_message: Option<String>,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values from `other`, which take precedence
    pub fn merge(self, other: RelayConfig) -> Self {
        Self {
            bind: other.bind.or(self.bind),
            port: other.port.or(self.port),
            welcome_message: other.welcome_message.or(self.welcome_message),
        }
    }

    /// Resolve into a server configuration, filling gaps with defaults
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let config = ServerConfig::new(
            self.bind.unwrap_or(defaults.bind),
            self.port.unwrap_or(defaults.port),
        );
        match self.welcome_message {
            Some(message) => config.with_welcome_message(message),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::DEFAULT_WELCOME_MESSAGE;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RelayConfig::parse("").unwrap().into_server_config();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.welcome_message, DEFAULT_WELCOME_MESSAGE);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
bind = "127.0.0.1"
port = 9100
welcome_message = "hej"
"#;
        let config = RelayConfig::parse(toml).unwrap();
        assert_eq!(config.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, Some(9100));

        let server = config.into_server_config();
        assert_eq!(server.socket_addr(), "127.0.0.1:9100");
        assert_eq!(server.welcome_message, "hej");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = RelayConfig::parse("prot = 1");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(RelayConfig::parse("port = 70000").is_err());
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = RelayConfig {
            bind: Some("10.0.0.1".to_string()),
            port: Some(1000),
            welcome_message: None,
        };
        let cli = RelayConfig {
            port: Some(2000),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.bind.as_deref(), Some("10.0.0.1"));
        assert_eq!(merged.port, Some(2000));
        assert!(merged.welcome_message.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8181").unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.port, Some(8181));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = RelayConfig::load(&dir.path().join("relay.toml"));
        assert!(matches!(result, Err(ConfigError::Read(_))));
    }
}
