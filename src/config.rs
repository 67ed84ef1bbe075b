// Application configuration
//
// Resolution order, later wins: built-in defaults, TOML file, environment
// variables, command-line flags (applied by main.rs).

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 8384;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Completion API provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Anthropic => "claude-sonnet-4-5-20250929",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Environment variable holding the provider's API key
    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            Provider::OpenAi => "sk-",
            Provider::Anthropic => "sk-ant-",
        }
    }

    /// Keychain account name
    pub fn key_account(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai_api_key",
            Provider::Anthropic => "anthropic_api_key",
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(Error::Config(format!(
                "unknown provider '{}', expected 'openai' or 'anthropic'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// Preferred port; nearby ports are tried if it is taken
    pub port: u16,
    /// Bearer token for `/api/*`; generated at startup when unset
    pub access_token: Option<String>,
    /// Send `Access-Control-Allow-Origin: *`. Off: only the page's own origin can call the API.
    pub cors_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            access_token: None,
            cors_any_origin: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 0 lets the provider decide where it can
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Never serialized back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            provider: Provider::OpenAi,
            model: None,
            base_url: None,
            max_tokens: 4096,
            timeout_secs: 120,
            api_key: None,
        }
    }
}

impl CompletionConfig {
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Key from the config file, else from the provider's environment variable
    pub fn configured_api_key<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .or_else(|| lookup(self.provider.api_key_env()))
            .filter(|key| !key.trim().is_empty())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    Sqlite,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of newest entries kept; older ones are evicted
    pub limit: usize,
    pub backend: HistoryBackend,
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            limit: DEFAULT_HISTORY_LIMIT,
            backend: HistoryBackend::Sqlite,
            path: None,
        }
    }
}

impl HistoryConfig {
    pub fn storage_path(&self) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, HistoryBackend::Sqlite) => PathBuf::from("lyricdeck.db"),
            (None, HistoryBackend::Json) => PathBuf::from("lyricdeck-history.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    ///
    /// Not validated here: command-line flags may still fix a bad value, so the
    /// caller validates once everything is applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                tracing::info!(path = %path.display(), "loaded config file");
                Self::from_toml(&text)?
            }
            None => AppConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `LYRICDECK_*` variables using `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = lookup("LYRICDECK_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("LYRICDECK_PORT is not a port: {}", port)))?;
        }
        if let Some(token) = lookup("LYRICDECK_ACCESS_TOKEN") {
            self.server.access_token = Some(token);
        }
        if let Some(provider) = lookup("LYRICDECK_PROVIDER") {
            self.switch_provider(provider.parse()?);
        }
        if let Some(model) = lookup("LYRICDECK_MODEL") {
            self.completion.model = Some(model);
        }
        if let Some(limit) = lookup("LYRICDECK_HISTORY_LIMIT") {
            self.history.limit = limit.trim().parse().map_err(|_| {
                Error::Config(format!("LYRICDECK_HISTORY_LIMIT is not a number: {}", limit))
            })?;
        }
        if let Some(db) = lookup("LYRICDECK_DB") {
            self.history.backend = HistoryBackend::Sqlite;
            self.history.path = Some(PathBuf::from(db));
        }
        Ok(())
    }

    /// Change provider. A base URL or key set for the previous provider is dropped.
    pub fn switch_provider(&mut self, provider: Provider) {
        if provider != self.completion.provider {
            self.completion.base_url = None;
            self.completion.api_key = None;
            self.completion.provider = provider;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.limit == 0 {
            return Err(Error::Config("history.limit must be at least 1".to_string()));
        }
        if self.completion.timeout_secs == 0 {
            return Err(Error::Config("completion.timeout_secs must be at least 1".to_string()));
        }
        if let Some(token) = &self.server.access_token {
            if token.trim().is_empty() {
                return Err(Error::Config("server.access_token must not be blank".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.completion.provider, Provider::OpenAi);
        assert_eq!(config.completion.model_name(), "gpt-4o-mini");
        assert_eq!(config.history.limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.history.storage_path(), PathBuf::from("lyricdeck.db"));
        assert!(!config.server.cors_any_origin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AppConfig::from_toml(
            r#"
            [completion]
            provider = "anthropic"
            timeout_secs = 30

            [history]
            limit = 20
            backend = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.completion.provider, Provider::Anthropic);
        assert_eq!(config.completion.model_name(), "claude-sonnet-4-5-20250929");
        assert_eq!(config.completion.base_url(), "https://api.anthropic.com/v1");
        assert_eq!(config.completion.timeout_secs, 30);
        assert_eq!(config.history.limit, 20);
        assert_eq!(config.history.storage_path(), PathBuf::from("lyricdeck-history.json"));
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("LYRICDECK_PORT", "9000"),
                ("LYRICDECK_PROVIDER", "anthropic"),
                ("LYRICDECK_HISTORY_LIMIT", "5"),
                ("LYRICDECK_DB", "/tmp/x.db"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.completion.provider, Provider::Anthropic);
        assert_eq!(config.history.limit, 5);
        assert_eq!(config.history.storage_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_api_key_sources() {
        let lookup = env(&[("OPENAI_API_KEY", "sk-from-env"), ("ANTHROPIC_API_KEY", "sk-ant-from-env")]);
        let mut completion = CompletionConfig::default();
        assert_eq!(completion.configured_api_key(&lookup).as_deref(), Some("sk-from-env"));

        completion.provider = Provider::Anthropic;
        assert_eq!(completion.configured_api_key(&lookup).as_deref(), Some("sk-ant-from-env"));

        completion.api_key = Some("sk-ant-from-file".to_string());
        assert_eq!(completion.configured_api_key(&lookup).as_deref(), Some("sk-ant-from-file"));

        let completion = CompletionConfig::default();
        assert_eq!(completion.configured_api_key(env(&[("OPENAI_API_KEY", " ")])), None);
    }

    #[test]
    fn test_env_provider_switch_drops_old_endpoint() {
        let mut config = AppConfig::from_toml(
            r#"
            [completion]
            provider = "openai"
            base_url = "http://localhost:9999/v1"
            api_key = "sk-openai-from-file"
            "#,
        )
        .unwrap();
        config.apply_env(env(&[("LYRICDECK_PROVIDER", "anthropic")])).unwrap();

        assert_eq!(config.completion.provider, Provider::Anthropic);
        assert_eq!(config.completion.base_url(), "https://api.anthropic.com/v1");
        assert_eq!(config.completion.api_key, None);
    }

    #[test]
    fn test_switch_to_same_provider_keeps_settings() {
        let mut config = AppConfig::default();
        config.completion.base_url = Some("http://proxy/v1".to_string());
        config.switch_provider(Provider::OpenAi);
        assert_eq!(config.completion.base_url(), "http://proxy/v1");
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyricdeck.toml");
        std::fs::write(&path, "[history]\nlimit = 0\n").unwrap();

        let mut config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.validate().is_err());
        config.history.limit = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("LYRICDECK_PORT", "eighty")])).is_err());
        assert!(config.apply_env(env(&[("LYRICDECK_PROVIDER", "gemini")])).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut config = AppConfig::default();
        config.history.limit = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = AppConfig::default();
        config.completion.api_key = Some("sk-secret".to_string());
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("sk-secret"));
    }
}
