//! TOML-based configuration for the access-control server.
//!
//! The default location is `$XDG_CONFIG_HOME/armas/config.toml`, falling back
//! to `~/.config/armas/config.toml`.  A different file can be chosen with
//! `--config` / `ARMAS_CONFIG`.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 5000
//! api_key = "change-this-to-a-secure-random-key"
//! log_level = "info"
//! cors_origins = ["*"]
//!
//! [filter]
//! binary = "iptables"
//! use_sudo = true
//! chain = "FORWARD"
//! command_timeout_secs = 5
//! max_unblock_attempts = 32
//!
//! [network]
//! interface = "eth0"
//! range = "192.168.100.0/24"
//! scan_timeout_secs = 30
//! devices_file = "/home/armas/.config/armas/devices.json"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]`, and every section is
//! `#[serde(default)]`, so a missing file, a missing section, or a missing
//! key all fall back to the values shown above.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::policy_store::DEFAULT_MAX_UNBLOCK_ATTEMPTS;

/// The API key shipped in the default configuration.  The server warns at
/// startup if it is still in use.
pub const DEFAULT_API_KEY: &str = "change-this-to-a-secure-random-key";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// HTTP listener and API access settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret expected in the `X-API-Key` header.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Allowed CORS origins.  `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

/// Packet-filter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterConfig {
    /// Path or name of the `iptables` binary.
    #[serde(default = "default_filter_binary")]
    pub binary: String,
    /// Prefix every invocation with `sudo`.
    #[serde(default = "default_true")]
    pub use_sudo: bool,
    /// Chain carrying forwarded traffic.
    #[serde(default = "default_chain")]
    pub chain: String,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Upper bound on deny-rule removals in one unblock.
    #[serde(default = "default_max_unblock_attempts")]
    pub max_unblock_attempts: u32,
}

/// Network discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Interface `arp-scan` probes.
    #[serde(default = "default_interface")]
    pub interface: String,
    /// CIDR range `arp-scan` probes.
    #[serde(default = "default_range")]
    pub range: String,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    /// JSON file holding operator-assigned device names.
    #[serde(default = "default_devices_file")]
    pub devices_file: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_filter_binary() -> String {
    "iptables".to_string()
}
fn default_true() -> bool {
    true
}
fn default_chain() -> String {
    "FORWARD".to_string()
}
fn default_command_timeout_secs() -> u64 {
    5
}
fn default_max_unblock_attempts() -> u32 {
    DEFAULT_MAX_UNBLOCK_ATTEMPTS
}
fn default_interface() -> String {
    "eth0".to_string()
}
fn default_range() -> String {
    "192.168.100.0/24".to_string()
}
fn default_scan_timeout_secs() -> u64 {
    30
}
fn default_devices_file() -> PathBuf {
    platform_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devices.json")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            api_key: default_api_key(),
            log_level: default_log_level(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            binary: default_filter_binary(),
            use_sudo: default_true(),
            chain: default_chain(),
            command_timeout_secs: default_command_timeout_secs(),
            max_unblock_attempts: default_max_unblock_attempts(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            range: default_range(),
            scan_timeout_secs: default_scan_timeout_secs(),
            devices_file: default_devices_file(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the directory holding `config.toml` and `devices.json`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the default path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `$XDG_CONFIG_HOME/armas` or `~/.config/armas`.
fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("armas"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("armas_config_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config_matches_documented_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.server.api_key, DEFAULT_API_KEY);
        assert_eq!(cfg.server.cors_origins, vec!["*"]);
        assert_eq!(cfg.filter.binary, "iptables");
        assert!(cfg.filter.use_sudo);
        assert_eq!(cfg.filter.chain, "FORWARD");
        assert_eq!(cfg.filter.command_timeout_secs, 5);
        assert_eq!(cfg.filter.max_unblock_attempts, 32);
        assert_eq!(cfg.network.interface, "eth0");
        assert_eq!(cfg.network.range, "192.168.100.0/24");
        assert_eq!(cfg.network.scan_timeout_secs, 30);
        assert!(cfg.network.devices_file.ends_with("devices.json"));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_given_keys() {
        // Arrange
        let toml_str = r#"
[server]
port = 8080

[filter]
use_sudo = false
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert!(!cfg.filter.use_sudo);
        assert_eq!(cfg.filter.chain, "FORWARD");
        assert_eq!(cfg.network, NetworkConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = temp_dir();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.server.api_key = "s3cret".to_string();
        cfg.network.interface = "wlan0".to_string();

        // Act
        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("armas/config.toml"), "got {path:?}");
        }
        // NoPlatformConfigDir is acceptable in a stripped CI environment.
    }
}
