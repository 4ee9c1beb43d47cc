use serde::{Deserialize, Serialize};

use crate::schema::{FilterField, DEFAULT_LIST_CAP};

/// Top-level configuration for joebot. Read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct JoebotConfig {
    pub store: StoreConfig,
    pub schema: SchemaConfig,
    pub agents: AgentsConfig,
    pub charts: ChartsConfig,
}

/// Configuration for the record store and fetch-result cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the jobs database written by `joebot-loader`.
    pub sqlite_path: String,
    /// Maximum number of memoized fetch results.
    pub result_cache_capacity: u64,
    pub result_cache_ttl_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/jobs.db".to_string(),
            result_cache_capacity: 1_000,
            result_cache_ttl_seconds: 600,
        }
    }
}

/// Which fields structured requests may use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    pub filterable_fields: Vec<String>,
    /// Maximum records returned by a `list` fetch.
    pub list_cap: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            filterable_fields: FilterField::ALL
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            list_cap: DEFAULT_LIST_CAP,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBackend {
    /// Any `/chat/completions` endpoint (OpenRouter by default).
    OpenAiCompatible,
    /// The local `claude` CLI.
    ClaudeCli,
}

/// Configuration for the planning agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// When false every query goes straight to the deterministic path.
    pub enabled: bool,
    /// Maximum tool calls per query.
    pub max_tool_calls: usize,
    /// Timeout for one completion request in seconds.
    pub completion_timeout_seconds: u64,
    pub backend: CompletionBackend,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tool_calls: 5,
            completion_timeout_seconds: 30,
            backend: CompletionBackend::OpenAiCompatible,
            model: "openai/gpt-oss-120b".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartsConfig {
    pub enabled: bool,
    /// Bars beyond this are dropped from charts.
    pub max_bars: usize,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_bars: 15,
        }
    }
}
