use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::{env, path::Path};

/// Main configuration for wordwatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Discord bot configuration
    pub discord: DiscordConfig,
    /// Registration storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Discord bot token
    pub token: String,
    /// Discord application ID
    pub application_id: Option<u64>,
    /// Companion bot whose messages are never scanned (loop prevention)
    pub excluded_bot_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the JSON watch file
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "notify_words.json".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new(),
                application_id: None,
                excluded_bot_id: None,
            },
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.is_empty() {
            return Err(ConfigError::Invalid {
                field: "discord.token".to_string(),
                reason: "Discord token cannot be empty".to_string(),
            }
            .into());
        }

        if self.storage.path.is_empty() {
            return Err(ConfigError::Invalid {
                field: "storage.path".to_string(),
                reason: "Storage path cannot be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Load configuration from environment variables and config file
    pub fn load() -> Result<Self> {
        // Try to load from file first
        let config_path =
            env::var("WORDWATCH_CONFIG").unwrap_or_else(|_| "wordwatch.toml".to_string());

        if Path::new(&config_path).exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(|_e| ConfigError::NotFound {
                    path: config_path.clone(),
                })?;
            let config: Config =
                toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed { source: e })?;

            // Override with environment variables
            Ok(config.override_from_env())
        } else {
            // Load from environment variables only
            Ok(Self::default().override_from_env())
        }
    }

    /// Override config values with environment variables
    fn override_from_env(mut self) -> Self {
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Ok(app_id) = env::var("APP_ID") {
            if let Ok(id) = app_id.parse() {
                self.discord.application_id = Some(id);
            }
        }
        if let Ok(bot_id) = env::var("EXCLUDED_BOT_ID") {
            if let Ok(id) = bot_id.parse() {
                self.discord.excluded_bot_id = Some(id);
            }
        }
        if let Ok(path) = env::var("WATCH_FILE") {
            self.storage.path = path;
        }

        self
    }
}

/// Helper to load dotenv file if it exists
pub fn load_dotenv() {
    if let Ok(path) = env::var("DOTENV_PATH") {
        dotenv::from_path(&path).ok();
    } else {
        dotenv::dotenv().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_fails_validation() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn populated_config_validates() {
        let mut config = Config::default();
        config.discord.token = "token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_shape_round_trips() {
        let toml_src = r#"
            [discord]
            token = "abc"
            application_id = 123
            excluded_bot_id = 456

            [storage]
            path = "custom.json"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.discord.token, "abc");
        assert_eq!(config.discord.application_id, Some(123));
        assert_eq!(config.discord.excluded_bot_id, Some(456));
        assert_eq!(config.storage.path, "custom.json");
    }

    #[test]
    fn storage_section_is_optional() {
        let config: Config = toml::from_str("[discord]\ntoken = \"abc\"\n").unwrap();
        assert_eq!(config.storage.path, "notify_words.json");
    }
}
