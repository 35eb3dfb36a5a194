//! # Configuration Module
//!
//! Configuration structures and loading for the gate.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support
//! - Validation with detailed error messages
//!
//! The signing key is read once at startup and shared read-only afterwards.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::{GateError, GateResult};

/// Default name of the session cookie
pub const DEFAULT_SESSION_COOKIE: &str = "sessionid";

/// Main gate configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Listener settings
    pub server: ServerConfig,

    /// Credential and bypass settings
    pub auth: AuthSettings,

    /// Log level and output format
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GateResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GateError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: GateConfig = serde_yaml::from_str(&content)
            .map_err(|e| GateError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> GateResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GateError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: GateConfig = serde_json::from_str(&content)
            .map_err(|e| GateError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a config file
    pub fn from_env() -> GateResult<Self> {
        let mut config = GateConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern: GATE_<SECTION>_<FIELD>
    /// For example: GATE_SERVER_HTTP_PORT=8080
    pub fn apply_env_overrides(&mut self) -> GateResult<()> {
        use std::env;

        if let Ok(addr) = env::var("GATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Ok(port) = env::var("GATE_SERVER_HTTP_PORT") {
            self.server.http_port = port
                .parse()
                .map_err(|e| GateError::config(format!("Invalid GATE_SERVER_HTTP_PORT: {}", e)))?;
        }

        if let Ok(timeout) = env::var("GATE_SERVER_REQUEST_TIMEOUT") {
            self.server.request_timeout = humantime::parse_duration(&timeout).map_err(|e| {
                GateError::config(format!("Invalid GATE_SERVER_REQUEST_TIMEOUT: {}", e))
            })?;
        }

        if let Ok(key) = env::var("GATE_AUTH_SIGNING_KEY") {
            self.auth.signing_key = SigningKey::from(key);
        }

        if let Ok(no_auth) = env::var("GATE_AUTH_NO_AUTH") {
            self.auth.no_auth = no_auth
                .parse()
                .map_err(|e| GateError::config(format!("Invalid GATE_AUTH_NO_AUTH: {}", e)))?;
        }

        if let Ok(level) = env::var("GATE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("GATE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> GateResult<()> {
        self.server.validate()?;
        self.auth.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,

    /// HTTP port
    pub http_port: u16,

    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl ServerConfig {
    fn validate(&self) -> GateResult<()> {
        if self.bind_address.trim().is_empty() {
            return Err(GateError::config("server.bind_address must not be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(GateError::config("server.request_timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 3005,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Shared secret used to sign and verify session tokens
    pub signing_key: SigningKey,

    /// Forward every request without checking credentials
    pub no_auth: bool,

    /// Name of the session cookie
    pub session_cookie: String,

    /// Accounts loaded into the in-memory credential store
    pub users: Vec<UserEntry>,
}

impl AuthSettings {
    fn validate(&self) -> GateResult<()> {
        if self.signing_key.is_empty() && !self.no_auth {
            return Err(GateError::config(
                "auth.signing_key must be set unless auth.no_auth is enabled",
            ));
        }

        if !is_cookie_name(&self.session_cookie) {
            return Err(GateError::config(format!(
                "auth.session_cookie is not a valid cookie name: {:?}",
                self.session_cookie
            )));
        }

        for user in &self.users {
            user.validate()?;
        }

        Ok(())
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            signing_key: SigningKey::default(),
            no_auth: false,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            users: Vec::new(),
        }
    }
}

fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_graphic() && !matches!(c, '=' | ';' | ',' | '"'))
}

/// A user account seeded into the in-memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,

    /// Hex-encoded SHA-256 digest of the password
    pub password_sha256: String,
}

impl UserEntry {
    fn validate(&self) -> GateResult<()> {
        if self.username.is_empty() {
            return Err(GateError::config("auth.users entries need a username"));
        }
        if self.username.contains(':') {
            return Err(GateError::config(format!(
                "username {:?} must not contain ':'",
                self.username
            )));
        }
        let digest_ok = self.password_sha256.len() == 64
            && self.password_sha256.chars().all(|c| c.is_ascii_hexdigit());
        if !digest_ok {
            return Err(GateError::config(format!(
                "password_sha256 for {:?} must be 64 hex characters",
                self.username
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    pub level: String,

    /// Log format (json, text)
    pub format: String,
}

impl LoggingConfig {
    fn validate(&self) -> GateResult<()> {
        match self.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(GateError::config(format!(
                "logging.format must be 'json' or 'text', got {:?}",
                other
            ))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Shared secret for session token signatures
///
/// Cloning shares the underlying bytes. `Debug` never prints them.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Arc<[u8]>);

impl Default for SigningKey {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SigningKey {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<&str> for SigningKey {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([redacted; {} bytes])", self.0.len())
    }
}

impl Serialize for SigningKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[redacted]")
    }
}

impl<'de> Deserialize<'de> for SigningKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SigningKey::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DIGEST: &str = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";

    fn valid_config() -> GateConfig {
        let mut config = GateConfig::default();
        config.auth.signing_key = SigningKey::from("test-secret");
        config
    }

    #[test]
    fn test_default_config_requires_key() {
        let config = GateConfig::default();
        assert!(config.validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_no_auth_allows_empty_key() {
        let mut config = GateConfig::default();
        config.auth.no_auth = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert!(!config.auth.no_auth);
        assert_eq!(config.auth.session_cookie, "sessionid");
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_signing_key_debug_is_redacted() {
        let key = SigningKey::from("super-secret");
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("12 bytes"));
    }

    #[test]
    fn test_cookie_name_validation() {
        let mut config = valid_config();
        config.auth.session_cookie = "bad name".to_string();
        assert!(config.validate().is_err());
        config.auth.session_cookie = "a=b".to_string();
        assert!(config.validate().is_err());
        config.auth.session_cookie = "gpodder_session".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_user_entry_validation() {
        let mut config = valid_config();
        config.auth.users.push(UserEntry {
            username: "alice".to_string(),
            password_sha256: DIGEST.to_string(),
        });
        assert!(config.validate().is_ok());

        config.auth.users.push(UserEntry {
            username: "bob:admin".to_string(),
            password_sha256: DIGEST.to_string(),
        });
        assert!(config.validate().is_err());

        config.auth.users.pop();
        config.auth.users.push(UserEntry {
            username: "carol".to_string(),
            password_sha256: "abc".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_validation() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_config_from_yaml_file() {
        let yaml = format!(
            r#"
server:
  bind_address: "127.0.0.1"
  http_port: 9000
  request_timeout: "5s"
auth:
  signing_key: "yaml-secret"
  users:
    - username: "alice"
      password_sha256: "{}"
logging:
  level: "debug"
  format: "text"
"#,
            DIGEST
        );

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = GateConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.http_port, 9000);
        assert_eq!(config.server.request_timeout, Duration::from_secs(5));
        assert_eq!(config.auth.signing_key.as_bytes(), b"yaml-secret");
        assert_eq!(config.auth.session_cookie, "sessionid");
        assert_eq!(config.auth.users.len(), 1);
        assert_eq!(config.logging.format, "text");
    }

    #[tokio::test]
    async fn test_load_config_from_json_file() {
        let json = r#"{"auth": {"no_auth": true}}"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = GateConfig::load_from_json(file.path()).await.unwrap();
        assert!(config.auth.no_auth);
        assert!(config.auth.signing_key.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_config_error() {
        let err = GateConfig::load_from_file("/nonexistent/gate.yaml").await.unwrap_err();
        assert!(matches!(err, GateError::Configuration { .. }));
    }
}
