//! Configuration loading and cache folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the Echo Nest API key
pub const API_KEY_ENV: &str = "ECHONEST_API_KEY";

/// Environment variable overriding the analysis cache folder
pub const CACHE_DIR_ENV: &str = "ECHONEST_CACHE_DIR";

/// Base URL of the Echo Nest API
pub const DEFAULT_BASE_URL: &str = "http://developer.echonest.com/api/";

/// Analysis schema version requested when none is configured
pub const DEFAULT_ANALYSIS_VERSION: u32 = 3;

/// Folder name used under the platform data directory
const APP_FOLDER_NAME: &str = "EchoNest";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Echo Nest API key (ENV takes priority)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL, defaults to [`DEFAULT_BASE_URL`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Analysis schema version, defaults to [`DEFAULT_ANALYSIS_VERSION`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_version: Option<u32>,

    /// Folder holding persisted analyses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Per-request timeout in seconds. Unset means requests never time out,
    /// which is what the blocking upload-and-wait call usually needs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn analysis_version(&self) -> u32 {
        self.analysis_version.unwrap_or(DEFAULT_ANALYSIS_VERSION)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default configuration file path: `<config_dir>/echonest/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("echonest").join("config.toml"))
}

/// Load TOML configuration
///
/// A missing file is not an error: defaults are returned and a warning is
/// logged. A file that exists but cannot be parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using built-in defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Write TOML configuration atomically (temp file + rename)
///
/// On Unix the file is restricted to 0600 since it may hold the API key.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the API key: CLI → ENV → TOML
pub fn resolve_api_key(cli_arg: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    if let Some(key) = cli_arg.filter(|k| is_valid_key(k)) {
        info!("API key taken from command line");
        return Ok(key.to_string());
    }

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if is_valid_key(&key) {
            info!("API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_config.api_key.as_deref().filter(|k| is_valid_key(k)) {
        info!("API key loaded from TOML config");
        return Ok(key.to_string());
    }

    Err(Error::Config(format!(
        "Echo Nest API key not configured. Please configure using one of:\n\
         1. Command line: --api-key your-key-here\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: ~/.config/echonest/config.toml (api_key = \"your-key\")",
        API_KEY_ENV
    )))
}

/// Resolve the analysis cache folder: CLI → ENV → TOML → OS default
pub fn resolve_cache_dir(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CACHE_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.cache_dir {
        return path.clone();
    }

    default_cache_dir()
}

/// OS-dependent default cache folder
pub fn default_cache_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        // ~/Library/Application Support/EchoNest
        dirs::data_dir()
            .map(|d| d.join(APP_FOLDER_NAME))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support").join(APP_FOLDER_NAME))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\EchoNest
        dirs::data_local_dir()
            .map(|d| d.join(APP_FOLDER_NAME))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData").join(APP_FOLDER_NAME))
    } else {
        // ~/.local/share/EchoNest
        dirs::data_local_dir()
            .map(|d| d.join(APP_FOLDER_NAME))
            .unwrap_or_else(|| PathBuf::from("./echonest_data"))
    }
}
