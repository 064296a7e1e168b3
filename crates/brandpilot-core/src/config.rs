//! Configuration management for Brandpilot
//!
//! Settings come from three layers, later ones winning:
//! built-in defaults, an optional TOML file, and environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// API key placeholders that switch the upstream client into mock mode
const MOCK_API_KEYS: &[&str] = &["", "your_api_key_here", "none", "test"];

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream LLM API settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Session cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Locations of brand briefs and the content database
    #[serde(default)]
    pub data: DataConfig,
}

/// Upstream LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (can be loaded from env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Base URL for the chat-completions API
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// Default request budget when a call does not pass its own
    pub request_timeout_secs: u64,
    /// Lifetime of cached completions
    pub cache_ttl_secs: u64,
    /// Default temperature
    pub temperature: f32,
    /// Default max tokens
    pub max_tokens: u32,
    /// Artificial delay applied to mock responses
    pub mock_latency_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("DEEPSEEK_API_KEY".to_string()),
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            request_timeout_secs: 60,
            cache_ttl_secs: 3600,
            temperature: 0.7,
            max_tokens: 1024,
            mock_latency_ms: 0,
        }
    }
}

impl ProviderConfig {
    /// Get the API key, checking environment variable if not set directly
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }

        if let Some(env_var) = &self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return Some(key);
            }
        }

        None
    }

    /// Whether no usable credential is configured
    pub fn is_mock(&self) -> bool {
        match self.get_api_key() {
            Some(key) => {
                let key = key.trim().to_lowercase();
                MOCK_API_KEYS.contains(&key.as_str())
            }
            None => true,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the remote Redis store; when false only the in-process map is used
    pub use_redis: bool,
    /// Full connection URL, takes precedence over host/port/db/password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Maximum entries held by the in-process fallback
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_redis: true,
            redis_url: None,
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            memory_capacity: 100,
        }
    }
}

impl CacheConfig {
    /// Connection URL for the Redis client
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.redis_url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Custom system prompt; the built-in prompt is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Number of (user, assistant) turns kept per session
    pub memory_window: usize,
    /// Sessions kept in memory; the least recently active one goes first
    pub max_sessions: usize,
    /// Maximum consecutive tool calls per query
    pub max_tool_depth: usize,
    pub initial_timeout_secs: u64,
    pub followup_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// Delay before a finished request record is dropped
    pub cleanup_delay_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            memory_window: 5,
            max_sessions: 1000,
            max_tool_depth: 8,
            initial_timeout_secs: 120,
            followup_timeout_secs: 90,
            tool_timeout_secs: 20,
            cleanup_delay_secs: 300,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Data directories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `*.json` brand briefs loaded at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_briefs_dir: Option<PathBuf>,
    /// Directory holding `db_index.json` and the content files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_db_dir: Option<PathBuf>,
}

impl Config {
    /// Overlay settings from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay settings from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("DEEPSEEK_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(base) = lookup("DEEPSEEK_API_BASE") {
            self.provider.base_url = base;
        }
        if let Some(model) = lookup("DEEPSEEK_MODEL") {
            self.provider.model = model;
        }
        if let Some(ttl) = lookup("CACHE_TTL") {
            self.provider.cache_ttl_secs = parse_var("CACHE_TTL", &ttl)?;
        }

        if let Some(window) = lookup("MEMORY_WINDOW_SIZE") {
            self.agent.memory_window = parse_var("MEMORY_WINDOW_SIZE", &window)?;
        }
        if let Some(sessions) = lookup("MAX_SESSIONS") {
            self.agent.max_sessions = parse_var("MAX_SESSIONS", &sessions)?;
        }
        if let Some(prompt) = lookup("AGENT_SYSTEM_PROMPT") {
            if !prompt.trim().is_empty() {
                self.agent.system_prompt = Some(prompt);
            }
        }

        if let Some(flag) = lookup("USE_REDIS") {
            self.cache.use_redis = parse_bool("USE_REDIS", &flag)?;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.cache.redis_url = Some(url);
        }
        if let Some(host) = lookup("REDIS_HOST") {
            self.cache.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            self.cache.port = parse_var("REDIS_PORT", &port)?;
        }
        if let Some(db) = lookup("REDIS_DB") {
            self.cache.db = parse_var("REDIS_DB", &db)?;
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.cache.password = Some(password);
        }

        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }

        if let Some(dir) = lookup("BRAND_BRIEFS_DIR") {
            self.data.brand_briefs_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("CONTENT_DB_DIR") {
            self.data.content_db_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: '{}'", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("Invalid value for {}: '{}'", name, value))),
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("brandpilot").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the manager, returning the loaded configuration
    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_key_detection() {
        let mut provider = ProviderConfig {
            api_key_env: None,
            ..Default::default()
        };
        assert!(provider.is_mock());

        for placeholder in ["", "your_api_key_here", "NONE", "test"] {
            provider.api_key = Some(placeholder.to_string());
            assert!(provider.is_mock(), "{} should enable mock mode", placeholder);
        }

        provider.api_key = Some("sk-live".to_string());
        assert!(!provider.is_mock());
    }

    #[test]
    fn test_connection_url() {
        let mut cache = CacheConfig::default();
        assert_eq!(cache.connection_url(), "redis://localhost:6379/0");

        cache.password = Some("secret".to_string());
        cache.db = 2;
        assert_eq!(cache.connection_url(), "redis://:secret@localhost:6379/2");

        cache.redis_url = Some("redis://cache.internal:6380".to_string());
        assert_eq!(cache.connection_url(), "redis://cache.internal:6380");
    }

    #[test]
    fn test_parse_bool_rejects_garbage() {
        assert!(parse_bool("USE_REDIS", "False").is_ok_and(|v| !v));
        assert!(parse_bool("USE_REDIS", "maybe").is_err());
    }
}
