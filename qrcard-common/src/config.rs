//! Configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (which also read their environment variables)
//! 2. TOML bootstrap file
//! 3. Built-in defaults
//!
//! The relational backend needs a database URL; resolution fails fast when
//! it is selected without one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::codec::PayloadFormat;
use crate::{Error, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

/// Persistence backend for scans and generated contacts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite database reached through `DATABASE_URL`
    #[default]
    Sqlite,
    /// `.xlsx` workbooks in the data directory
    Sheet,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Sheet => write!(f, "sheet"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "database" | "db" => Ok(BackendKind::Sqlite),
            "sheet" | "xlsx" | "excel" => Ok(BackendKind::Sheet),
            other => Err(format!("unknown backend '{}' (expected sqlite or sheet)", other)),
        }
    }
}

/// QR error correction level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ErrorCorrection {
    #[default]
    L,
    M,
    Q,
    H,
}

impl FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(ErrorCorrection::L),
            "M" => Ok(ErrorCorrection::M),
            "Q" => Ok(ErrorCorrection::Q),
            "H" => Ok(ErrorCorrection::H),
            other => Err(format!("unknown error correction level '{}'", other)),
        }
    }
}

/// Upper bound for `qr.module_size`, in pixels
pub const MAX_MODULE_SIZE: u32 = 40;

/// Upper bound for `qr.border`, in modules
pub const MAX_BORDER: u32 = 16;

/// Fixed QR rendering parameters
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QrSettings {
    #[serde(default)]
    pub error_correction: ErrorCorrection,

    /// Pixels per module
    #[serde(default = "default_module_size")]
    pub module_size: u32,

    /// Quiet zone width in modules
    #[serde(default = "default_border")]
    pub border: u32,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::L,
            module_size: default_module_size(),
            border: default_border(),
        }
    }
}

fn default_module_size() -> u32 {
    10
}

fn default_border() -> u32 {
    4
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bootstrap configuration loaded from a TOML file
///
/// Every key is optional; missing keys fall back to built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend: Option<BackendKind>,
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub payload_format: Option<PayloadFormat>,
    #[serde(default)]
    pub qr: QrSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Load and parse a TOML bootstrap file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend: Option<BackendKind>,
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub payload_format: Option<PayloadFormat>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    /// Required when `backend` is [`BackendKind::Sqlite`]
    pub database_url: Option<String>,
    /// Workbook directory for the sheet backend
    pub data_dir: PathBuf,
    /// Directory for saved QR images, served under `/static`
    pub static_dir: PathBuf,
    pub payload_format: PayloadFormat,
    pub qr: QrSettings,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Merge overrides over the TOML file over defaults, then validate
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let config = Self {
            host: overrides
                .host
                .or(toml.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            backend: overrides.backend.or(toml.backend).unwrap_or_default(),
            database_url: overrides
                .database_url
                .or(toml.database_url)
                .filter(|url| !url.trim().is_empty()),
            data_dir: overrides
                .data_dir
                .or(toml.data_dir)
                .unwrap_or_else(|| PathBuf::from("./data")),
            static_dir: overrides
                .static_dir
                .or(toml.static_dir)
                .unwrap_or_else(|| PathBuf::from("./static")),
            payload_format: overrides
                .payload_format
                .or(toml.payload_format)
                .unwrap_or_default(),
            qr: toml.qr,
            logging: toml.logging,
        };

        config.validate()?;
        info!(
            "Configuration resolved: backend={}, payload_format={}",
            config.backend, config.payload_format
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Sqlite && self.database_url.is_none() {
            return Err(Error::Config(
                "DATABASE_URL environment variable is required for the sqlite backend".to_string(),
            ));
        }
        if self.qr.module_size == 0 || self.qr.module_size > MAX_MODULE_SIZE {
            return Err(Error::Config(format!(
                "qr.module_size must be between 1 and {}",
                MAX_MODULE_SIZE
            )));
        }
        if self.qr.border > MAX_BORDER {
            return Err(Error::Config(format!(
                "qr.border must be at most {}",
                MAX_BORDER
            )));
        }
        Ok(())
    }

    /// Socket address string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("XLSX".parse::<BackendKind>().unwrap(), BackendKind::Sheet);
        assert!("postgres".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_error_correction_parse() {
        assert_eq!("h".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::H);
        assert!("Z".parse::<ErrorCorrection>().is_err());
    }

    #[test]
    fn test_qr_settings_defaults() {
        let qr = QrSettings::default();
        assert_eq!(qr.error_correction, ErrorCorrection::L);
        assert_eq!(qr.module_size, 10);
        assert_eq!(qr.border, 4);
    }
}
