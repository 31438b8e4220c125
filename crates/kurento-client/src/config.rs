//! Client configuration.
//!
//! Settings live in `~/.config/kurento/config.toml` by default:
//!
//! ```toml
//! [server]
//! address = "tcp://127.0.0.1:8888"   # or "unix:///run/kurento/kms.sock"
//! timeout = 30                        # seconds per call
//! connect_timeout = 5
//! session_id = "optional-session"
//!
//! [logging]
//! level = "info"
//! format = "compact"                  # pretty | compact | json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use kurento_core::{TracingConfig, TracingOutputFormat};
use serde::{Deserialize, Serialize};
use tracing::Level;
use url::{Host, Url};

use crate::error::ConfigError;

/// Default Kurento JSON-RPC port.
pub const DEFAULT_PORT: u16 = 8888;

/// Configuration for the Kurento client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// Where and how to reach the media server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: ServerAddress,

    /// Per-call deadline in seconds.
    pub timeout: u64,

    /// Connection establishment deadline in seconds.
    pub connect_timeout: u64,

    /// Session id attached to every request.
    pub session_id: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: ServerAddress::default(),
            timeout: 30,
            connect_timeout: 5,
            session_id: None,
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: TracingOutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: TracingOutputFormat::Compact,
        }
    }
}

impl LoggingSettings {
    /// Builds the tracing configuration for these settings.
    pub fn to_tracing_config(&self) -> Result<TracingConfig, ConfigError> {
        let level = Level::from_str(&self.level)
            .map_err(|_| ConfigError::InvalidLevel(self.level.clone()))?;
        Ok(TracingConfig::default()
            .with_level(level)
            .with_format(self.format))
    }
}

/// Media server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServerAddress {
    /// `tcp://host:port`
    Tcp { host: String, port: u16 },
    /// `unix:///path/to/socket`
    Unix(PathBuf),
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::Tcp {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl FromStr for ServerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| ConfigError::invalid_address(s, e.to_string()))?;
        match url.scheme() {
            "tcp" => {
                // IPv6 literals are kept without their URL brackets so they
                // resolve as addresses.
                let host = match url.host() {
                    Some(Host::Domain(domain)) => domain.to_string(),
                    Some(Host::Ipv4(addr)) => addr.to_string(),
                    Some(Host::Ipv6(addr)) => addr.to_string(),
                    None => return Err(ConfigError::invalid_address(s, "missing host")),
                };
                Ok(Self::Tcp {
                    host,
                    port: url.port().unwrap_or(DEFAULT_PORT),
                })
            }
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(ConfigError::invalid_address(s, "missing socket path"));
                }
                Ok(Self::Unix(PathBuf::from(path)))
            }
            other => Err(ConfigError::invalid_address(
                s,
                format!("unsupported scheme '{other}' (expected tcp or unix)"),
            )),
        }
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ServerAddress> for String {
    fn from(address: ServerAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, falling back to defaults
    /// when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kurento")
    }
}
