//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.ideabot/config.json`) and environment.
//! Environment variables override file values; everything is resolved once at startup
//! and baked into the clients, so no component reads the environment afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Telegram Bot API settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// OpenAI settings (chat completion and transcription share the key).
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Airtable record store settings.
    #[serde(default)]
    pub airtable: AirtableConfig,
}

/// Webhook server bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Listening port (default 3000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; Telegram must be able to reach the webhook).
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    3000
}

fn default_server_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Telegram settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Bot API base URL override (default https://api.telegram.org).
    pub api_base: Option<String>,
}

/// OpenAI settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiConfig {
    /// API key. Overridden by OPENAI_API_KEY env when set.
    pub api_key: Option<String>,
    /// API base URL override (default https://api.openai.com/v1).
    pub api_base: Option<String>,
}

/// Airtable settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirtableConfig {
    /// API key. Overridden by AIRTABLE_API_KEY env when set.
    pub api_key: Option<String>,
    /// Base id (e.g. "appXXXXXXXXXXXXXX"). Overridden by AIRTABLE_BASE_ID env when set.
    pub base_id: Option<String>,
    /// Table name (default "Content Ideas"). Overridden by AIRTABLE_TABLE_NAME env when set.
    pub table_name: Option<String>,
    /// API base URL override (default https://api.airtable.com/v0).
    pub api_base: Option<String>,
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn config_value(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the Telegram bot token: env TELEGRAM_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    env_value("TELEGRAM_TOKEN").or_else(|| config_value(&config.telegram.bot_token))
}

/// Resolve the OpenAI API key: env OPENAI_API_KEY overrides config.
pub fn resolve_openai_api_key(config: &Config) -> Option<String> {
    env_value("OPENAI_API_KEY").or_else(|| config_value(&config.openai.api_key))
}

/// Resolve the Airtable API key: env AIRTABLE_API_KEY overrides config.
pub fn resolve_airtable_api_key(config: &Config) -> Option<String> {
    env_value("AIRTABLE_API_KEY").or_else(|| config_value(&config.airtable.api_key))
}

/// Resolve the Airtable base id: env AIRTABLE_BASE_ID overrides config.
pub fn resolve_airtable_base_id(config: &Config) -> Option<String> {
    env_value("AIRTABLE_BASE_ID").or_else(|| config_value(&config.airtable.base_id))
}

/// Resolve the Airtable table name: env AIRTABLE_TABLE_NAME, then config, then "Content Ideas".
pub fn resolve_airtable_table(config: &Config) -> String {
    env_value("AIRTABLE_TABLE_NAME")
        .or_else(|| config_value(&config.airtable.table_name))
        .unwrap_or_else(|| "Content Ideas".to_string())
}

/// Resolve the listening port: env PORT (when it parses) overrides config.
pub fn resolve_port(config: &Config) -> u16 {
    env_value("PORT")
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.server.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("IDEABOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".ideabot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or IDEABOT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_port_and_bind() {
        let s = ServerConfig::default();
        assert_eq!(s.port, 3000);
        assert_eq!(s.bind, "0.0.0.0");
    }

    #[test]
    fn table_name_defaults_to_content_ideas() {
        let config = Config::default();
        assert_eq!(resolve_airtable_table(&config), "Content Ideas");
    }

    #[test]
    fn table_name_from_config() {
        let mut config = Config::default();
        config.airtable.table_name = Some("Drafts".to_string());
        assert_eq!(resolve_airtable_table(&config), "Drafts");
    }

    #[test]
    fn empty_config_values_are_treated_as_unset() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("   ".to_string());
        assert_eq!(resolve_telegram_token(&config), None);
    }

    #[test]
    fn config_sections_parse_from_camel_case_json() {
        let config: Config = serde_json::from_str(
            r#"{
                "server": { "port": 8080 },
                "airtable": { "baseId": "appTEST", "tableName": "Ideas" }
            }"#,
        )
        .expect("parse config");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.airtable.base_id.as_deref(), Some("appTEST"));
        assert_eq!(resolve_airtable_table(&config), "Ideas");
    }
}
