//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be baked in at compile time via SUPABASE_URL).
pub const DEFAULT_SUPABASE_URL: Option<&str> = option_env!("SUPABASE_URL");

/// Default Supabase anon key (can be baked in at compile time via SUPABASE_KEY).
pub const DEFAULT_SUPABASE_ANON_KEY: Option<&str> = option_env!("SUPABASE_KEY");

/// Deep link scheme registered by the mobile shell for OAuth callbacks.
pub const DEFAULT_APP_SCHEME: &str = "opentab";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to expose).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// Deep link scheme for the OAuth callback URL.
    #[serde(default = "default_app_scheme")]
    pub app_scheme: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.unwrap_or("").to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.unwrap_or("").to_string()
}

fn default_app_scheme() -> String {
    DEFAULT_APP_SCHEME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            app_scheme: default_app_scheme(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Ok(key) = std::env::var("SUPABASE_KEY") {
            self.supabase_anon_key = key;
        } else if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
        if let Ok(log_level) = std::env::var("OPENTAB_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(scheme) = std::env::var("OPENTAB_APP_SCHEME") {
            self.app_scheme = scheme;
        }
    }

    /// Check that every required value is present, naming each missing one.
    ///
    /// The backend URL and API key have no usable fallback; starting without
    /// them is a hard error rather than a silent degraded mode.
    pub fn validate(&self) -> CoreResult<()> {
        let mut missing = Vec::new();
        if self.supabase_url.trim().is_empty() {
            missing.push("SUPABASE_URL");
        }
        if self.supabase_anon_key.trim().is_empty() {
            missing.push("SUPABASE_KEY");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Config(format!(
                "Missing required configuration: {}. Set the environment variable(s) or add the value(s) to ~/.opentab/config.json",
                missing.join(", ")
            )))
        }
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn populated_config() -> Config {
        Config {
            log_level: "info".to_string(),
            supabase_url: "https://example.supabase.co".to_string(),
            supabase_anon_key: "anon-key".to_string(),
            app_scheme: "opentab".to_string(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.app_scheme, DEFAULT_APP_SCHEME);
        assert_eq!(config.supabase_url, DEFAULT_SUPABASE_URL.unwrap_or(""));
        assert_eq!(
            config.supabase_anon_key,
            DEFAULT_SUPABASE_ANON_KEY.unwrap_or("")
        );
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "supabase_url": "https://example.supabase.co",
            "supabase_anon_key": "anon-key"
        }"#;

        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.supabase_url, "https://example.supabase.co");
        assert_eq!(config.supabase_anon_key, "anon-key");
        // Field absent from the file falls back to the default
        assert_eq!(config.app_scheme, DEFAULT_APP_SCHEME);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = populated_config();
        config.log_level = "trace".to_string();

        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.supabase_url, "https://example.supabase.co");
    }

    #[test]
    fn test_validate_names_each_missing_value() {
        let config = Config {
            log_level: "info".to_string(),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            app_scheme: "opentab".to_string(),
        };

        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SUPABASE_URL"));
        assert!(message.contains("SUPABASE_KEY"));
    }

    #[test]
    fn test_validate_names_only_the_missing_value() {
        let mut config = populated_config();
        config.supabase_anon_key = String::new();

        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("SUPABASE_URL"));
        assert!(message.contains("SUPABASE_KEY"));
    }

    #[test]
    fn test_validate_accepts_populated_config() {
        assert!(populated_config().validate().is_ok());
    }

    #[test]
    fn test_config_supabase_url_parse() {
        let config = populated_config();
        let url = config.supabase_url().unwrap();
        assert_eq!(url.scheme(), "https");
        assert!(url.host_str().unwrap().contains("supabase.co"));
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = populated_config();
        config.supabase_url = "not a valid url".to_string();

        let result = config.supabase_url();
        assert!(result.is_err());
    }
}
