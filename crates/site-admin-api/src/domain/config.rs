//! Service configuration with validation.
//!
//! Loaded from an optional JSON file, then overridden from the environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Development secret shipped in the defaults. Startup warns when it is in use.
pub const DEFAULT_SECRET_KEY: &str = "465789789";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Service identity reported by `/api/status`
    pub service: ServiceInfoConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Session token and account configuration
    pub auth: AuthConfig,
    /// Filesystem locations
    pub storage: StorageConfig,
    /// Request body limits
    pub limits: LimitsConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl AdminConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        if self.auth.token_max_age.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "token_max_age cannot be 0".into(),
            ));
        }

        if self.auth.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }

        if self.limits.max_json_body == 0 {
            return Err(ConfigError::InvalidLimit("max_json_body cannot be 0".into()));
        }

        if self.limits.max_upload_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_upload_size cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Load from a JSON file. Missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Load configuration from `SITE_CONFIG` (if set) and environment overrides.
    ///
    /// # Environment Variables
    ///
    /// - `SITE_CONFIG`: Path to a JSON config file
    /// - `SITE_HOST` / `SITE_PORT`: Bind address
    /// - `SITE_SECRET_KEY`: Token signing secret
    /// - `SITE_DATA_DIR` / `SITE_LOG_DIR`: Storage roots
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("SITE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SITE_HOST") {
            if let Ok(h) = host.parse() {
                self.server.host = h;
            }
        }
        if let Ok(port) = std::env::var("SITE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(secret) = std::env::var("SITE_SECRET_KEY") {
            self.auth.secret_key = secret;
        }
        if let Ok(dir) = std::env::var("SITE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SITE_LOG_DIR") {
            self.storage.log_dir = PathBuf::from(dir);
        }
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Whether the shipped development secret is still configured
    pub fn uses_default_secret(&self) -> bool {
        self.auth.secret_key == DEFAULT_SECRET_KEY
    }
}

/// Service identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInfoConfig {
    /// Display name
    pub name: String,
    /// Version string returned by `/api/status`
    pub version: String,
}

impl Default for ServiceInfoConfig {
    fn default() -> Self {
        Self {
            name: "site-admin".to_string(),
            version: "v1.0".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 5000)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 5000,
        }
    }
}

/// A login account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name
    pub name: String,
    /// Plain-text password
    pub password: String,
}

/// Session token and account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    pub secret_key: String,
    /// Maximum token age before it is rejected
    #[serde(with = "humantime_serde")]
    pub token_max_age: Duration,
    /// Accounts keyed by client name
    pub accounts: HashMap<String, Account>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let accounts = [("admin", "1"), ("test", "2")]
            .into_iter()
            .map(|(name, password)| {
                (
                    name.to_string(),
                    Account {
                        name: name.to_string(),
                        password: password.to_string(),
                    },
                )
            })
            .collect();

        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            token_max_age: Duration::from_secs(86_400 * 100), // 100 days
            accounts,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for the info blob and image directories
    pub data_dir: PathBuf,
    /// Root for log sinks and the request id record
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl StorageConfig {
    /// Path of the persisted info blob
    pub fn info_path(&self) -> PathBuf {
        self.data_dir.join("home_info.json")
    }

    /// Path of the durable request id record
    pub fn request_id_path(&self) -> PathBuf {
        self.log_dir.join("api").join("request_id.json")
    }
}

/// Request body limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max JSON body size in bytes (default: 2MB)
    pub max_json_body: usize,
    /// Max multipart upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_json_body: 2 * 1024 * 1024,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["*".to_string()],
            max_age: 86400, // 24 hours
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Token secret is empty
    #[error("secret_key cannot be empty")]
    EmptySecret,
    /// No login accounts configured
    #[error("at least one account must be configured")]
    NoAccounts,
    /// Invalid size limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid duration value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Config file could not be read
    #[error("cannot read config file: {0}")]
    Io(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else if let Some(days) = s.strip_suffix('d') {
            days.trim()
                .parse::<u64>()
                .ok()
                .and_then(|d| d.checked_mul(86_400))
                .map(Duration::from_secs)
                .ok_or("invalid days")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdminConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.token_max_age, Duration::from_secs(8_640_000));
        assert_eq!(config.auth.accounts["admin"].password, "1");
        assert!(config.uses_default_secret());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut config = AdminConfig::default();
        config.auth.secret_key.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptySecret)));
    }

    #[test]
    fn test_zero_max_age_rejected() {
        let mut config = AdminConfig::default();
        config.auth.token_max_age = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_no_accounts_rejected() {
        let mut config = AdminConfig::default();
        config.auth.accounts.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoAccounts)));
    }

    #[test]
    fn test_storage_paths() {
        let config = AdminConfig::default();
        assert_eq!(
            config.storage.info_path(),
            PathBuf::from("data/home_info.json")
        );
        assert_eq!(
            config.storage.request_id_path(),
            PathBuf::from("logs/api/request_id.json")
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AdminConfig = serde_json::from_str(
            r#"{"server": {"port": 8080}, "auth": {"secret_key": "s3cret", "token_max_age": "2d"}}"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.secret_key, "s3cret");
        assert_eq!(config.auth.token_max_age, Duration::from_secs(172_800));
        assert_eq!(config.auth.accounts.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        use humantime_serde::parse_duration;
        assert_eq!(parse_duration("90s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3m"), Ok(Duration::from_secs(180)));
        assert_eq!(parse_duration("60"), Ok(Duration::from_secs(60)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        use humantime_serde::parse_duration;
        assert_eq!(parse_duration("2d"), Ok(Duration::from_secs(172_800)));
        assert_eq!(
            parse_duration(&format!("{}m", u64::MAX / 60 + 1)),
            Err("invalid minutes")
        );
        assert_eq!(
            parse_duration(&format!("{}d", u64::MAX)),
            Err("invalid days")
        );
    }
}
