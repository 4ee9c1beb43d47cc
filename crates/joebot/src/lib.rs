//! JoeBot - natural-language questions over AEA JOE job listings
//!
//! A planning agent turns a question into structured fetches against the
//! jobs database. When the agent is disabled or fails, a deterministic
//! matcher answers the same question through fixed templates.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use joebot::models::{JoebotConfig, Query};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let orchestrator = joebot::build_orchestrator(&JoebotConfig::default())?;
//! let response = joebot::ask(&orchestrator, &Query::new("cli", "How many jobs in 2024?")).await;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub use joebot_agents as agents;
pub use joebot_models as models;
pub use joebot_store as store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Datelike;
use joebot_agents::{
    AgentLoop, ChartRenderer, ClaudeCliClient, CompletionClient, CompletionPlanner,
    DeterministicMatcher, JobFetcher, OpenAiCompatibleClient, Orchestrator, PlanningAgent,
    QueryResponse, ResolutionStrategy, SvgChartRenderer,
};
use joebot_models::{AgentsConfig, CompletionBackend, FilterSchema, JoebotConfig, Query};
use joebot_store::{Fetcher, RecordStore};
use secrecy::SecretString;
use tracing::{info, warn};

/// Build an Orchestrator from configuration, loading every record from
/// the configured database.
pub fn build_orchestrator(config: &JoebotConfig) -> anyhow::Result<Orchestrator> {
    let store = RecordStore::load(&config.store.sqlite_path)
        .with_context(|| format!("Failed to load jobs from {}", config.store.sqlite_path))?;
    orchestrator_from_store(config, store, chrono::Local::now().year())
}

/// Build an Orchestrator over an already loaded store.
pub fn orchestrator_from_store(
    config: &JoebotConfig,
    store: RecordStore,
    current_year: i32,
) -> anyhow::Result<Orchestrator> {
    let schema = Arc::new(
        FilterSchema::new(
            &config.schema.filterable_fields,
            config.schema.list_cap,
            current_year,
        )
        .context("Invalid [schema] configuration")?,
    );

    let fetcher = Fetcher::new(
        Arc::new(store),
        config.store.result_cache_capacity,
        Duration::from_secs(config.store.result_cache_ttl_seconds),
    );
    let matcher = DeterministicMatcher::new(Arc::clone(&schema), fetcher.store().vocabulary());
    let records = fetcher.store().len();
    let fetcher: Arc<dyn JobFetcher> = Arc::new(fetcher);

    let mut chain: Vec<Arc<dyn ResolutionStrategy>> = Vec::new();
    if let Some(client) = completion_client(&config.agents)? {
        let planner: Arc<dyn PlanningAgent> = Arc::new(CompletionPlanner::new(
            client,
            &schema,
            config.agents.temperature,
        ));
        chain.push(Arc::new(AgentLoop::new(
            planner,
            Arc::clone(&fetcher),
            Arc::clone(&schema),
            config.agents.max_tool_calls,
            Duration::from_secs(config.agents.completion_timeout_seconds),
        )));
    }

    let charts: Option<Arc<dyn ChartRenderer>> = config
        .charts
        .enabled
        .then(|| Arc::new(SvgChartRenderer::new(config.charts.max_bars)) as Arc<dyn ChartRenderer>);

    info!(
        records,
        agent = !chain.is_empty(),
        charts = charts.is_some(),
        "Orchestrator ready"
    );
    Ok(Orchestrator::new(chain, matcher, fetcher, charts))
}

/// The completion client for the agent tier, or `None` when agent mode is
/// off. An HTTP backend without an API key turns agent mode off.
fn completion_client(
    config: &AgentsConfig,
) -> anyhow::Result<Option<Arc<dyn CompletionClient>>> {
    if !config.enabled {
        return Ok(None);
    }
    let timeout = Duration::from_secs(config.completion_timeout_seconds);

    let client: Arc<dyn CompletionClient> = match config.backend {
        CompletionBackend::ClaudeCli => {
            Arc::new(ClaudeCliClient::new(config.model.clone(), timeout))
        }
        CompletionBackend::OpenAiCompatible => {
            let Some(key) = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
            else {
                warn!(
                    env = %config.api_key_env,
                    "No API key found, agent mode disabled"
                );
                return Ok(None);
            };
            let client = OpenAiCompatibleClient::new(
                config.base_url.clone(),
                config.model.clone(),
                Some(SecretString::from(key)),
                timeout,
            )
            .map_err(|e| anyhow::anyhow!("Failed to build completion client: {e}"))?;
            Arc::new(client)
        }
    };
    Ok(Some(client))
}

/// Answer one question. Never fails: degraded answers carry `degraded = true`.
pub async fn ask(orchestrator: &Orchestrator, query: &Query) -> QueryResponse {
    orchestrator.answer(query).await
}
