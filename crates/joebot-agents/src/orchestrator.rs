use std::sync::Arc;
use std::time::Instant;

use joebot_models::{FallbackReason, FetchResult, Query, ResolutionPath, ValidatedSpec};
use tracing::{error, info, warn};

use crate::chart::{ChartArtifact, ChartRenderer};
use crate::fetch::JobFetcher;
use crate::matcher::{DeterministicMatcher, MatchOutcome};
use crate::prompts::help_text;
use crate::render::{render, with_footer, UNABLE_TO_PROCESS};
use crate::strategy::{Escalation, Resolution, ResolutionStrategy};

/// What the orchestrator hands back for one query.
#[derive(Debug)]
pub struct QueryResponse {
    pub text: String,
    /// Deleted from disk when the response is dropped.
    pub chart: Option<ChartArtifact>,
    pub path: ResolutionPath,
    pub tool_calls: usize,
    /// True for every deterministic-path response.
    pub degraded: bool,
}

/// Runs the strategy chain, then the deterministic path if every strategy
/// escalated. `answer` never fails.
pub struct Orchestrator {
    chain: Vec<Arc<dyn ResolutionStrategy>>,
    matcher: DeterministicMatcher,
    fetcher: Arc<dyn JobFetcher>,
    charts: Option<Arc<dyn ChartRenderer>>,
}

impl Orchestrator {
    /// An empty `chain` means agent mode is disabled.
    pub fn new(
        chain: Vec<Arc<dyn ResolutionStrategy>>,
        matcher: DeterministicMatcher,
        fetcher: Arc<dyn JobFetcher>,
        charts: Option<Arc<dyn ChartRenderer>>,
    ) -> Self {
        Self {
            chain,
            matcher,
            fetcher,
            charts,
        }
    }

    pub fn strategies(&self) -> impl Iterator<Item = &str> {
        self.chain.iter().map(|s| s.name())
    }

    pub async fn answer(&self, query: &Query) -> QueryResponse {
        let start = Instant::now();
        info!(session = %query.session_id, "Query received");

        let escalation = if query.text.trim().eq_ignore_ascii_case("help") {
            Escalation::new(FallbackReason::HelpRequested, "help command", 0)
        } else if self.chain.is_empty() {
            Escalation::new(FallbackReason::AgentDisabled, "no resolution strategies", 0)
        } else {
            match self.run_chain(query).await {
                Ok(response) => {
                    info!(
                        session = %query.session_id,
                        tool_calls = response.tool_calls,
                        elapsed_ms = start.elapsed().as_millis(),
                        "Query answered"
                    );
                    return response;
                }
                Err(escalation) => escalation,
            }
        };

        let response = self.answer_deterministically(query, &escalation).await;
        info!(
            session = %query.session_id,
            reason = %escalation.reason,
            tool_calls = response.tool_calls,
            elapsed_ms = start.elapsed().as_millis(),
            "Query answered by fallback"
        );
        response
    }

    /// Try each strategy in order. Returns the last escalation when all fail.
    async fn run_chain(&self, query: &Query) -> Result<QueryResponse, Escalation> {
        let mut escalation = Escalation::new(FallbackReason::AgentDisabled, "empty chain", 0);

        for strategy in &self.chain {
            let name = strategy.name().to_string();
            let task_strategy = Arc::clone(strategy);
            let task_query = query.clone();
            let handle =
                tokio::spawn(async move { task_strategy.resolve(&task_query).await });

            escalation = match handle.await {
                Ok(Ok(resolution)) => return Ok(self.from_resolution(name, resolution)),
                Ok(Err(escalation)) => {
                    warn!(
                        strategy = %name,
                        reason = %escalation.reason,
                        detail = %escalation.detail,
                        tool_calls = escalation.tool_calls,
                        "Strategy escalated"
                    );
                    escalation
                }
                Err(e) => {
                    error!(strategy = %name, error = %e, "Strategy task panicked");
                    Escalation::new(FallbackReason::StrategyPanicked, e.to_string(), 0)
                }
            };
        }

        Err(escalation)
    }

    fn from_resolution(&self, strategy: String, resolution: Resolution) -> QueryResponse {
        let chart = resolution
            .last
            .as_ref()
            .and_then(|(spec, result)| self.chart_for(spec, result));
        QueryResponse {
            text: resolution.text,
            chart,
            path: ResolutionPath::Strategy { name: strategy },
            tool_calls: resolution.tool_calls,
            degraded: false,
        }
    }

    async fn answer_deterministically(
        &self,
        query: &Query,
        escalation: &Escalation,
    ) -> QueryResponse {
        let (text, chart) = match self.matcher.resolve(&query.text) {
            MatchOutcome::Help => (help_text(self.matcher.schema().list_cap()), None),
            MatchOutcome::Fetch(spec) => match self.fetcher.fetch(&spec).await {
                Ok(result) => (render(&spec, &result), self.chart_for(&spec, &result)),
                Err(e) => {
                    error!(error = %e, "Deterministic fetch failed");
                    (UNABLE_TO_PROCESS.to_string(), None)
                }
            },
        };

        let text = if escalation.reason.is_failure() {
            with_footer(&text)
        } else {
            text
        };
        QueryResponse {
            text,
            chart,
            path: ResolutionPath::Fallback {
                reason: escalation.reason,
            },
            tool_calls: escalation.tool_calls,
            degraded: true,
        }
    }

    fn chart_for(&self, spec: &ValidatedSpec, result: &FetchResult) -> Option<ChartArtifact> {
        if !spec.visualize() || !result.has_aggregate() {
            return None;
        }
        let renderer = self.charts.as_ref()?;
        let title = match &result.axis {
            Some(axis) => format!("Job postings by {axis}"),
            None => "Job postings".to_string(),
        };
        match renderer.render(result, &title) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(error = %e, "Chart rendering failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::SvgChartRenderer;
    use crate::render::DEGRADED_FOOTER;
    use crate::render::UNABLE_TO_PROCESS;
    use crate::test_support::{fixture_fetcher, fixture_matcher, FailingFetcher};
    use async_trait::async_trait;

    struct PanickingStrategy;

    #[async_trait]
    impl ResolutionStrategy for PanickingStrategy {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn resolve(&self, _query: &Query) -> Result<Resolution, Escalation> {
            panic!("strategy bug");
        }
    }

    struct FixedStrategy(Result<Resolution, Escalation>);

    #[async_trait]
    impl ResolutionStrategy for FixedStrategy {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn resolve(&self, _query: &Query) -> Result<Resolution, Escalation> {
            self.0.clone()
        }
    }

    fn orchestrator(chain: Vec<Arc<dyn ResolutionStrategy>>) -> Orchestrator {
        Orchestrator::new(
            chain,
            fixture_matcher(),
            Arc::new(fixture_fetcher()),
            Some(Arc::new(SvgChartRenderer::new(15))),
        )
    }

    #[tokio::test]
    async fn empty_chain_is_agent_disabled() {
        let response = orchestrator(vec![])
            .answer(&Query::new("s", "How many jobs at Harvard?"))
            .await;
        assert_eq!(
            response.path,
            ResolutionPath::Fallback {
                reason: FallbackReason::AgentDisabled
            }
        );
        assert!(response.degraded);
        assert_eq!(
            response.text,
            "Found 2 job postings matching institution: Harvard."
        );
    }

    #[tokio::test]
    async fn help_skips_the_chain() {
        let strategy: Arc<dyn ResolutionStrategy> = Arc::new(PanickingStrategy);
        let response = orchestrator(vec![strategy])
            .answer(&Query::new("s", "  HELP "))
            .await;
        assert_eq!(
            response.path,
            ResolutionPath::Fallback {
                reason: FallbackReason::HelpRequested
            }
        );
        assert!(response.text.contains("How many jobs were posted in 2024?"));
        assert!(!response.text.contains(DEGRADED_FOOTER));
    }

    #[tokio::test]
    async fn panicking_strategy_falls_back() {
        let strategy: Arc<dyn ResolutionStrategy> = Arc::new(PanickingStrategy);
        let response = orchestrator(vec![strategy])
            .answer(&Query::new("s", "How many jobs at MIT?"))
            .await;
        assert_eq!(
            response.path,
            ResolutionPath::Fallback {
                reason: FallbackReason::StrategyPanicked
            }
        );
        assert!(response.text.starts_with("Found 1 job posting matching institution: MIT."));
        assert!(response.text.ends_with(DEGRADED_FOOTER));
    }

    #[tokio::test]
    async fn later_strategy_can_recover() {
        let failing: Arc<dyn ResolutionStrategy> = Arc::new(FixedStrategy(Err(Escalation::new(
            FallbackReason::PlanningFailure,
            "down",
            0,
        ))));
        let working: Arc<dyn ResolutionStrategy> = Arc::new(FixedStrategy(Ok(Resolution {
            text: "Three postings.".to_string(),
            last: None,
            tool_calls: 1,
        })));
        let response = orchestrator(vec![failing, working])
            .answer(&Query::new("s", "q"))
            .await;
        assert_eq!(response.text, "Three postings.");
        assert_eq!(
            response.path,
            ResolutionPath::Strategy {
                name: "fixed".to_string()
            }
        );
        assert!(!response.degraded);
    }

    #[tokio::test]
    async fn fallback_chart_for_visualized_stats() {
        let response = orchestrator(vec![])
            .answer(&Query::new("s", "chart jobs by year"))
            .await;
        let chart = response.chart.expect("chart attached");
        assert!(chart.path().exists());
        assert!(response.text.starts_with("Job postings by year:"));
    }

    #[tokio::test]
    async fn store_failure_on_fallback_is_unable_to_process() {
        let orchestrator = Orchestrator::new(
            vec![],
            fixture_matcher(),
            Arc::new(FailingFetcher),
            Some(Arc::new(SvgChartRenderer::new(15))),
        );
        let response = orchestrator
            .answer(&Query::new("s", "chart jobs by year"))
            .await;
        assert_eq!(response.text, UNABLE_TO_PROCESS);
        assert!(response.chart.is_none());
        assert!(response.degraded);
    }

    #[tokio::test]
    async fn no_chart_without_visualize() {
        let response = orchestrator(vec![])
            .answer(&Query::new("s", "jobs by year"))
            .await;
        assert!(response.chart.is_none());
    }
}
