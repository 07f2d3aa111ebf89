//! Client configuration
//!
//! Combines command-line overrides with the shared TOML/ENV resolution from
//! echonest-common into the settings a retrieval runs with.

use echonest_common::config::{resolve_api_key, resolve_cache_dir, TomlConfig};
use echonest_common::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Values given explicitly by the caller (e.g. CLI flags); highest priority
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub analysis_version: Option<u32>,
    pub cache_dir: Option<PathBuf>,
}

/// Resolved settings for talking to the service
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub analysis_version: u32,
    pub cache_dir: PathBuf,
    /// `None`: requests never time out
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Resolve every setting: overrides → ENV → TOML → defaults
    pub fn resolve(overrides: &ConfigOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let api_key = resolve_api_key(overrides.api_key.as_deref(), toml_config)?;
        let cache_dir = resolve_cache_dir(overrides.cache_dir.as_deref(), toml_config);

        let config = Self {
            base_url: overrides
                .base_url
                .clone()
                .unwrap_or_else(|| toml_config.base_url().to_string()),
            api_key,
            analysis_version: overrides
                .analysis_version
                .unwrap_or_else(|| toml_config.analysis_version()),
            cache_dir,
            request_timeout: toml_config.request_timeout_secs.map(Duration::from_secs),
        };

        tracing::info!(
            base_url = %config.base_url,
            analysis_version = config.analysis_version,
            cache_dir = %config.cache_dir.display(),
            "Client configuration resolved"
        );
        Ok(config)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key_len", &self.api_key.len())
            .field("analysis_version", &self.analysis_version)
            .field("cache_dir", &self.cache_dir)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echonest_common::config::DEFAULT_BASE_URL;

    #[test]
    fn test_overrides_win_over_toml() {
        let toml_config = TomlConfig {
            api_key: Some("toml-key".to_string()),
            analysis_version: Some(2),
            request_timeout_secs: Some(90),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            api_key: Some("cli-key".to_string()),
            analysis_version: Some(4),
            cache_dir: Some(PathBuf::from("/tmp/cache")),
            ..Default::default()
        };

        let config = ClientConfig::resolve(&overrides, &toml_config).unwrap();
        assert_eq!(config.api_key, "cli-key");
        assert_eq!(config.analysis_version, 4);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: "very-secret".to_string(),
            analysis_version: 3,
            cache_dir: PathBuf::from("/tmp"),
            request_timeout: None,
        };
        assert!(!format!("{:?}", config).contains("very-secret"));
    }
}
