//! # Configuration Management
//!
//! Protocol constants and runtime configuration for the SCRAM server and client.
//!
//! The constants describe the wire format and must not change between peers.
//! [`ScramConfig`] carries the tunable parts (expiry windows, pending-request cap,
//! client timeouts, credential file, logging). Its defaults reproduce the
//! protocol constants exactly.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Length of client and server nonces in bytes
pub const NONCE_LEN: usize = 30;

/// Length of a per-account salt in bytes
pub const SALT_LEN: usize = 24;

/// Length of stored keys, server keys, proofs and signatures
pub const KEY_LEN: usize = 32;

/// Length of an issued session token in characters
pub const TOKEN_LEN: usize = 30;

/// Smallest accepted PBKDF2 iteration count
pub const MIN_ITERATIONS: u32 = 4096;

/// Largest iteration count that fits the 4-digit wire field
pub const MAX_ITERATIONS: u32 = 9999;

/// Number of ASCII digits used to encode the iteration count
pub const ITERATION_DIGITS: usize = 4;

/// Field delimiter used by every message layout
pub const DELIMITER: u8 = b',';

/// Marker between the salt and the iteration count in server-first
pub const ITERATION_MARKER: &[u8; 3] = b",i=";

/// Prefix marking a protocol-level error reply
pub const ERROR_PREFIX: char = '!';

/// How long a client-first may wait for its client-final (ms)
pub const PENDING_REQUEST_TTL_MS: u64 = 60_000;

/// Upper bound on live pending handshakes
pub const MAX_PENDING_REQUESTS: usize = 100;

/// Sliding lifetime of a session token (ms)
pub const TOKEN_TTL_MS: u64 = 300_000;

/// Role carried by administrative accounts
pub const ADMIN_ROLE: &str = "ADM";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ScramConfig {
    /// Server orchestrator configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client orchestrator configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Credential source configuration
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScramConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(ttl) = std::env::var("SCRAM_PENDING_TTL_MS") {
            if let Ok(val) = ttl.parse::<u64>() {
                config.server.pending_request_ttl = Duration::from_millis(val);
            }
        }

        if let Ok(cap) = std::env::var("SCRAM_MAX_PENDING_REQUESTS") {
            if let Ok(val) = cap.parse::<usize>() {
                config.server.max_pending_requests = val;
            }
        }

        if let Ok(ttl) = std::env::var("SCRAM_TOKEN_TTL_MS") {
            if let Ok(val) = ttl.parse::<u64>() {
                config.server.token_ttl = Duration::from_millis(val);
            }
        }

        if let Ok(path) = std::env::var("SCRAM_CREDENTIALS_FILE") {
            config.credentials.source_file = Some(path);
        }

        if let Ok(timeout) = std::env::var("SCRAM_RESPONSE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.response_timeout = Duration::from_millis(val);
            }
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
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content).map_err(|e| {
            ProtocolError::ConfigError(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.credentials.validate());
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

/// Server orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// How long an accepted client-first waits for its client-final
    #[serde(with = "millis")]
    pub pending_request_ttl: Duration,

    /// Maximum number of live pending handshakes
    pub max_pending_requests: usize,

    /// Sliding lifetime of an issued token
    #[serde(with = "millis")]
    pub token_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pending_request_ttl: Duration::from_millis(PENDING_REQUEST_TTL_MS),
            max_pending_requests: MAX_PENDING_REQUESTS,
            token_ttl: Duration::from_millis(TOKEN_TTL_MS),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.pending_request_ttl.as_millis() < 1000 {
            errors.push("Pending request TTL too short (minimum: 1s)".to_string());
        } else if self.pending_request_ttl.as_secs() > 600 {
            errors.push("Pending request TTL too long (maximum: 600s)".to_string());
        }

        if self.max_pending_requests == 0 {
            errors.push("Max pending requests must be greater than 0".to_string());
        } else if self.max_pending_requests > 100_000 {
            errors.push(format!(
                "Max pending requests too large: {} (max recommended: 100,000)",
                self.max_pending_requests
            ));
        }

        if self.token_ttl.as_secs() < 10 {
            errors.push("Token TTL too short (minimum: 10s)".to_string());
        } else if self.token_ttl.as_secs() > 86_400 {
            errors.push("Token TTL too long (maximum: 24 hours)".to_string());
        }

        errors
    }
}

/// Client orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Timeout for each request/response exchange
    #[serde(with = "millis")]
    pub response_timeout: Duration,

    /// Whether to run one fresh handshake when the server drops the token
    pub reauthenticate_on_invalid_token: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
            reauthenticate_on_invalid_token: true,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        } else if self.response_timeout.as_secs() > 300 {
            errors.push("Response timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Credential source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    /// TOML file holding the account records
    pub source_file: Option<String>,

    /// Role an account must carry to be loaded
    pub admin_role: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            source_file: None,
            admin_role: String::from(ADMIN_ROLE),
        }
    }
}

impl CredentialsConfig {
    /// Validate credential source configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.admin_role.trim().is_empty() {
            errors.push("Admin role cannot be empty".to_string());
        }

        if let Some(ref path) = self.source_file {
            if path.is_empty() {
                errors.push("Credentials file path cannot be empty".to_string());
            } else if !Path::new(path).exists() {
                errors.push(format!("Credentials file does not exist: {path}"));
            }
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
    #[serde(with = "log_level")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("scram-session"),
            log_level: Level::INFO,
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

        errors
    }
}

/// Durations travel as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Log levels travel as lowercase names; any case is accepted on input
mod log_level {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {name}")))
    }
}
