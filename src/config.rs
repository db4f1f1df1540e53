//! # Configuration Management
//!
//! Centralized configuration for sessions, the TCP transport and logging.
//!
//! ## Configuration Sources
//! - TOML files via [`NetworkConfig::from_file`]
//! - TOML strings via [`NetworkConfig::from_toml`]
//! - Environment overrides via [`NetworkConfig::from_env`]
//! - Direct instantiation with defaults
//!
//! Durations are written in milliseconds. A zero read or write timeout disables that
//! deadline.
//!
//! ```toml
//! [session]
//! max_frame_size = 2097151
//! read_timeout = 30000
//! write_timeout = 10000
//!
//! [transport]
//! address = "127.0.0.1:25565"
//! connect_timeout = 5000
//! shutdown_timeout = 10000
//! tcp_nodelay = true
//!
//! [logging]
//! app_name = "packet-session"
//! log_level = "info"
//! log_to_console = true
//! log_to_file = false
//! json_format = false
//! ```

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Largest frame length a 3-byte varint prefix can describe
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2_097_151;

/// Hard ceiling for configurable frame sizes (16 MB)
pub const MAX_FRAME_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Per-session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// TCP transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `PACKET_SESSION_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PACKET_SESSION_ADDRESS") {
            config.transport.address = addr;
        }

        if let Ok(value) = std::env::var("PACKET_SESSION_CONNECT_TIMEOUT_MS") {
            config.transport.connect_timeout = parse_millis("PACKET_SESSION_CONNECT_TIMEOUT_MS", &value)?;
        }

        if let Ok(value) = std::env::var("PACKET_SESSION_READ_TIMEOUT_MS") {
            config.session.read_timeout = parse_millis("PACKET_SESSION_READ_TIMEOUT_MS", &value)?;
        }

        if let Ok(value) = std::env::var("PACKET_SESSION_WRITE_TIMEOUT_MS") {
            config.session.write_timeout = parse_millis("PACKET_SESSION_WRITE_TIMEOUT_MS", &value)?;
        }

        if let Ok(value) = std::env::var("PACKET_SESSION_MAX_FRAME_SIZE") {
            config.session.max_frame_size = value.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PACKET_SESSION_MAX_FRAME_SIZE: {e}"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.session.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid {name}: {e}")))
}

/// Per-session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Maximum frame length accepted or produced, in bytes
    pub max_frame_size: usize,

    /// Maximum silence before the session fails with "Read timed out." (0 disables)
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,

    /// Maximum time for one frame to be written (0 disables)
    #[serde(with = "duration_serde")]
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: timeout::READ_TIMEOUT,
            write_timeout: timeout::WRITE_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        timeout::non_zero(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        timeout::non_zero(self.write_timeout)
    }

    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size == 0 {
            errors.push("Max frame size cannot be 0".to_string());
        } else if self.max_frame_size > MAX_FRAME_SIZE_LIMIT {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: {} bytes)",
                self.max_frame_size, MAX_FRAME_SIZE_LIMIT
            ));
        }

        if !self.read_timeout.is_zero() && self.read_timeout.as_millis() < 100 {
            errors.push("Read timeout too short (minimum: 100ms, or 0 to disable)".to_string());
        }

        if !self.write_timeout.is_zero() && self.write_timeout.as_millis() < 10 {
            errors.push("Write timeout too short (minimum: 10ms, or 0 to disable)".to_string());
        }

        errors
    }
}

/// TCP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Address to listen on or connect to (e.g., "127.0.0.1:25565")
    pub address: String,

    /// Deadline for establishing a connection
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Time a server waits for sessions to close on shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Disable Nagle's algorithm on accepted and connected sockets
    pub tcp_nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:25565"),
            connect_timeout: timeout::CONNECT_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            tcp_nodelay: true,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Transport address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid transport address format: '{}' (expected format: '0.0.0.0:25565')",
                self.address
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packet-session"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
