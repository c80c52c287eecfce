//! TOML configuration for `sbsutil`.
//!
//! Read from an explicit path, or from the platform-appropriate location:
//! - Windows:  `%APPDATA%\sbsutil\sbsutil.toml`
//! - Linux:    `~/.config/sbsutil/sbsutil.toml`
//! - macOS:    `~/Library/Application Support/sbsutil/sbsutil.toml`
//!
//! A missing file is not an error: every field has a default, so the tool
//! runs on first use and keeps working when older files lack newer keys.
//!
//! ```toml
//! [general]
//! log_level = "debug"
//!
//! [transport]
//! connect_timeout_ms = 5000
//! io_timeout_ms = 30000      # 0 disables the per-call limit
//!
//! [tls]
//! certificate = "/var/lib/lockdown/host.pem"
//! private_key = "/var/lib/lockdown/host.key"
//!
//! [[services]]
//! device = "00008030-001A2B3C4D5E6F70"   # omit to match any device
//! service = "com.apple.springboardservices"
//! host = "127.0.0.1"
//! port = 49152
//! use_encryption = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sbs_core::protocol::DEFAULT_MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::transport::tls::{device_tls_config, TlsError, TlsIdentity};
use crate::infrastructure::transport::TransportConfig;

const CONFIG_FILE_NAME: &str = "sbsutil.toml";

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

    /// Only one of `tls.certificate` / `tls.private_key` was set.
    #[error("tls.certificate and tls.private_key must be set together")]
    IncompleteTlsIdentity,

    #[error(transparent)]
    Tls(#[from] TlsError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub tls: TlsSection,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Connection limits.  Times are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportSection {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// `0` means no limit.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

/// Client identity presented to encrypted services.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
}

/// A pre-started service endpoint, as served by
/// [`StaticServiceProvider`](crate::infrastructure::lockdown::StaticServiceProvider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEntry {
    /// UDID this entry applies to; absent matches every device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub service: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub use_encryption: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_io_timeout_ms() -> u64 {
    30_000
}
fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl AppConfig {
    /// Builds the session settings, loading the TLS identity if configured.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::IncompleteTlsIdentity`] if only one PEM path is set.
    /// - [`ConfigError::Tls`] if the PEM files cannot be read or parsed.
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let tls = match (&self.tls.certificate, &self.tls.private_key) {
            (Some(cert), Some(key)) => {
                let identity = TlsIdentity::from_pem_files(cert, key)?;
                Some(Arc::new(device_tls_config(Some(&identity))?))
            }
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTlsIdentity),
        };

        Ok(TransportConfig {
            connect_timeout: Duration::from_millis(self.transport.connect_timeout_ms),
            io_timeout: match self.transport.io_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            max_frame_size: self.transport.max_frame_size,
            tls,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the default config file path.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads the config from `path`, or from [`config_file_path`] when `None`.
///
/// Returns `AppConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Writes `config` to `path` (or the default location), creating parent
/// directories.  Returns the path written.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("sbsutil"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("sbsutil"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("sbsutil"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
