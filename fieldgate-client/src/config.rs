//! Configuration loading for fieldgate clients.
//!
//! All fields are required unless explicitly marked optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default permission cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub auth: ClientCredentials,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientCredentials {
    pub api_key: Option<String>,
    pub jwt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Directory for the on-disk session fallback. In-memory when absent.
    pub session_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            session_dir: None,
        }
    }
}

fn default_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or FIELDGATE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Load and validate the file at `path`. `None` means the caller was
    /// given no config location at all.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.auth.api_key.is_none() && self.auth.jwt.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "auth",
                reason: "api_key or jwt must be provided".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(dir) = &self.cache.session_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.session_dir",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
api_base_url = "https://ops.example.com/api"
request_timeout_ms = 5000

[auth]
jwt = "token"
"#;

    #[test]
    fn test_parse_minimal_config_uses_default_ttl() {
        let config = ClientConfig::from_toml(VALID).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cache.ttl_ms, DEFAULT_CACHE_TTL_MS);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert!(config.cache.session_dir.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let toml = format!("retries = 3\n{}", VALID);
        let err = ClientConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = ClientConfig::from_toml(
            r#"
api_base_url = "https://ops.example.com"
request_timeout_ms = 5000

[auth]
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "auth", .. }));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = ClientConfig::from_toml(&format!("{}\n[cache]\nttl_ms = 0\n", VALID)).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "cache.ttl_ms", .. }));
    }

    #[test]
    fn test_base_url_scheme_required() {
        let config = ClientConfig::from_toml(&VALID.replace("https://", "")).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "api_base_url", .. }));
    }

    #[test]
    fn test_load_without_path_is_missing_config() {
        assert!(matches!(ClientConfig::load(None), Err(ConfigError::MissingConfigPath)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldgate.toml");
        std::fs::write(&path, format!("{}\n[cache]\nsession_dir = \"/var/tmp/fg\"\n", VALID)).unwrap();

        let config = ClientConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.cache.session_dir, Some(PathBuf::from("/var/tmp/fg")));
    }

    #[test]
    fn test_load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldgate.toml");
        std::fs::write(&path, VALID.replace("5000", "0")).unwrap();

        let err = ClientConfig::load(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "request_timeout_ms", .. }));
    }
}
