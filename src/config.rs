//! Configuration loading and validation.
//!
//! `config.toml` lives in `~/.kindred/` next to the `.env` credentials file,
//! the SQLite database and the logs directory. Every section has defaults so
//! a minimal file (or none at all) is valid.
//!
//! Precedence: `KINDRED_*` env vars > config file > defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Text-generation model routing.
    pub models: ModelsConfig,

    /// Knowledge-graph API settings.
    pub taste_graph: TasteGraphConfig,

    /// Messaging transport settings.
    pub messaging: MessagingConfig,

    /// Delivery targets for introductions.
    pub dispatch: DispatchConfig,

    /// Conversation flow settings.
    pub conversation: ConversationConfig,

    /// Commonality scoring settings.
    pub scoring: ScoringConfig,

    /// Persistent storage settings.
    pub storage: StorageConfig,
}

/// Model routing: default model plus per-role overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Default model identifier (e.g. "anthropic/claude-sonnet-4-5-20250929").
    pub default: String,

    /// Per-role overrides keyed by `insight`, `introduction` or `housing`.
    pub roles: HashMap<String, String>,

    /// Base URL for Ollama models.
    pub ollama_url: Option<String>,

    /// Request timeout for one generation call, in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            roles: HashMap::new(),
            ollama_url: None,
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

/// Knowledge-graph API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasteGraphConfig {
    /// API base URL.
    pub base_url: String,

    /// Credential key holding the API key.
    pub api_key_env: String,

    /// Request timeout applied to every call, in seconds.
    pub timeout_secs: u64,

    /// Entity type recommended by the scorer's biased recommendation pass.
    pub recommendation_type: String,
}

impl Default for TasteGraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_taste_url(),
            api_key_env: "KINDRED_TASTE_API_KEY".to_owned(),
            timeout_secs: default_timeout_secs(),
            recommendation_type: "urn:entity:artist".to_owned(),
        }
    }
}

/// Messaging transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Web API base URL.
    pub base_url: String,

    /// Credential key holding the bot token.
    pub bot_token_env: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://slack.com/api".to_owned(),
            bot_token_env: "KINDRED_BOT_TOKEN".to_owned(),
        }
    }
}

/// Delivery targets for introductions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Whether introductions are delivered at all.
    pub enabled: bool,

    /// Number of top-ranked candidates to introduce.
    pub top_n: usize,

    /// Identity pre-assigned to each rank position (index 0 = best match).
    /// Empty strings leave a position unassigned.
    pub rank_identities: Vec<String>,

    /// Shared channel used when no direct identity works.
    pub default_channel: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_n: default_top_n(),
            rank_identities: Vec::new(),
            default_channel: None,
        }
    }
}

/// Conversation flow settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// How long long-term conversation memory is kept, in seconds.
    pub memory_ttl_secs: u64,

    /// Ask for age range and preferences instead of using placeholders.
    pub elicit_preferences: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            memory_ttl_secs: default_memory_ttl_secs(),
            elicit_preferences: false,
        }
    }
}

/// Commonality scoring settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Location token that yields a shared-office commonality when both
    /// profiles' locations contain it.
    pub office_location_token: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            office_location_token: "San Francisco".to_owned(),
        }
    }
}

/// Persistent storage settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `~/.kindred/kindred.db`.
    pub database: Option<PathBuf>,
}

// Default value functions for serde

fn default_model() -> String {
    "anthropic/claude-sonnet-4-5-20250929".to_owned()
}
fn default_taste_url() -> String {
    "https://hackathon.api.qloo.com".to_owned()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_model_timeout_secs() -> u64 {
    30
}
fn default_top_n() -> usize {
    3
}
fn default_memory_ttl_secs() -> u64 {
    86_400
}

impl Config {
    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error when the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests avoid mutating process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("KINDRED_MODEL") {
            self.models.default = v;
        }
        if let Some(v) = env("KINDRED_OLLAMA_URL") {
            self.models.ollama_url = Some(v);
        }
        if let Some(v) = env("KINDRED_TASTE_URL") {
            self.taste_graph.base_url = v;
        }
        if let Some(v) = env("KINDRED_TASTE_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.taste_graph.timeout_secs = n,
                Err(_) => tracing::warn!(
                    var = "KINDRED_TASTE_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("KINDRED_DEFAULT_CHANNEL") {
            self.dispatch.default_channel = Some(v);
        }
        if let Some(v) = env("KINDRED_DATABASE") {
            self.storage.database = Some(PathBuf::from(v));
        }
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        crate::providers::parse_provider_string(&self.models.default)
            .context("models.default is invalid")?;
        for (role, spec) in &self.models.roles {
            crate::providers::parse_provider_string(spec)
                .with_context(|| format!("models.roles.{role} is invalid"))?;
        }
        url::Url::parse(&self.taste_graph.base_url)
            .with_context(|| format!("taste_graph.base_url {:?}", self.taste_graph.base_url))?;
        url::Url::parse(&self.messaging.base_url)
            .with_context(|| format!("messaging.base_url {:?}", self.messaging.base_url))?;
        if self.models.timeout_secs == 0 {
            anyhow::bail!("models.timeout_secs must be greater than zero");
        }
        if self.taste_graph.timeout_secs == 0 {
            anyhow::bail!("taste_graph.timeout_secs must be greater than zero");
        }
        if self.dispatch.top_n == 0 {
            anyhow::bail!("dispatch.top_n must be greater than zero");
        }
        Ok(())
    }
}

/// Load config from a TOML file, apply env overrides and validate.
///
/// A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or fails validation.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(contents) => {
            tracing::debug!(path = %path.display(), "loading config from file");
            toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file found, using defaults");
            Config::default()
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            ))
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Filesystem locations used at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Root directory (`~/.kindred/`).
    pub root: PathBuf,
    /// Human-owned configuration file.
    pub config_toml: PathBuf,
    /// Credentials file.
    pub env_file: PathBuf,
    /// Default SQLite database.
    pub database: PathBuf,
    /// Log directory.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Lay out runtime paths under `root`.
    pub fn under(root: PathBuf) -> Self {
        Self {
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            database: root.join("kindred.db"),
            logs_dir: root.join("logs"),
            root,
        }
    }
}

/// Resolve the default config directory (`~/.kindred/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".kindred"))
}

/// Resolve the default runtime paths.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::under(config_dir()?))
}
