//! Scripted planners, completion clients and fixture builders shared by
//! unit tests and the integration suites under `tests/`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use joebot_models::{
    ConversationState, FetchResult, FetchType, FilterSchema, FilterSpec, JobRecord,
    PlannerDecision, ValidatedSpec,
};
use joebot_store::{Fetcher, RecordStore, StoreError};
use tokio::sync::Mutex;

use crate::agent_loop::AgentLoop;
use crate::chart::SvgChartRenderer;
use crate::completion::{CompletionClient, CompletionRequest};
use crate::error::PlanningFailure;
use crate::fetch::JobFetcher;
use crate::matcher::DeterministicMatcher;
use crate::orchestrator::Orchestrator;
use crate::planner::{PlanningAgent, PlanningRequest};
use crate::strategy::ResolutionStrategy;

/// Year the fixture schema treats as "now".
pub const FIXTURE_YEAR: i32 = 2025;

pub fn job(id: &str, institution: &str, field: &str, country: &str, year: i32) -> JobRecord {
    JobRecord {
        id: id.to_string(),
        title: format!("Assistant Professor of {field}"),
        institution: Some(institution.to_string()),
        field: Some(field.to_string()),
        country: Some(country.to_string()),
        year: Some(year),
        ..Default::default()
    }
}

/// Harvard 2023, Harvard 2024, MIT 2024.
pub fn fixture_records() -> Vec<JobRecord> {
    vec![
        job("1", "Harvard", "econ", "US", 2023),
        job("2", "Harvard", "econ", "US", 2024),
        job("3", "MIT", "cs", "US", 2024),
    ]
}

/// Thirty Stanford postings spread over 2015..=2024.
pub fn thirty_records() -> Vec<JobRecord> {
    (0..30)
        .map(|i| job(&format!("s{i:02}"), "Stanford", "econ", "US", 2015 + (i % 10)))
        .collect()
}

pub fn fixture_schema() -> Arc<FilterSchema> {
    Arc::new(FilterSchema::full(FIXTURE_YEAR))
}

pub fn fetcher_for(records: Vec<JobRecord>) -> Fetcher {
    Fetcher::new(Arc::new(RecordStore::new(records)), 100, Duration::from_secs(60))
}

pub fn fixture_fetcher() -> Fetcher {
    fetcher_for(fixture_records())
}

pub fn fixture_matcher() -> DeterministicMatcher {
    let fetcher = fixture_fetcher();
    DeterministicMatcher::new(fixture_schema(), fetcher.store().vocabulary())
}

/// Orchestrator over `records` with an agent tier when `planner` is given.
pub fn orchestrator_for(
    records: Vec<JobRecord>,
    planner: Option<Arc<dyn PlanningAgent>>,
    max_tool_calls: usize,
    decision_timeout: Duration,
) -> Orchestrator {
    let fetcher = fetcher_for(records);
    let matcher = DeterministicMatcher::new(fixture_schema(), fetcher.store().vocabulary());
    assemble(matcher, Arc::new(fetcher), planner, max_tool_calls, decision_timeout)
}

/// Orchestrator over the fixture vocabulary whose every fetch fails.
pub fn failing_store_orchestrator(planner: Option<Arc<dyn PlanningAgent>>) -> Orchestrator {
    assemble(
        fixture_matcher(),
        Arc::new(FailingFetcher),
        planner,
        5,
        Duration::from_secs(5),
    )
}

fn assemble(
    matcher: DeterministicMatcher,
    fetcher: Arc<dyn JobFetcher>,
    planner: Option<Arc<dyn PlanningAgent>>,
    max_tool_calls: usize,
    decision_timeout: Duration,
) -> Orchestrator {
    let chain: Vec<Arc<dyn ResolutionStrategy>> = planner
        .map(|planner| {
            Arc::new(AgentLoop::new(
                planner,
                Arc::clone(&fetcher),
                fixture_schema(),
                max_tool_calls,
                decision_timeout,
            )) as Arc<dyn ResolutionStrategy>
        })
        .into_iter()
        .collect();
    Orchestrator::new(
        chain,
        matcher,
        fetcher,
        Some(Arc::new(SvgChartRenderer::new(15))),
    )
}

pub fn fixture_orchestrator(
    planner: Option<Arc<dyn PlanningAgent>>,
    max_tool_calls: usize,
) -> Orchestrator {
    orchestrator_for(
        fixture_records(),
        planner,
        max_tool_calls,
        Duration::from_secs(5),
    )
}

/// Fails every fetch as if the store broke an invariant.
pub struct FailingFetcher;

#[async_trait]
impl JobFetcher for FailingFetcher {
    async fn fetch(&self, spec: &ValidatedSpec) -> Result<FetchResult, StoreError> {
        Err(StoreError::InvariantViolation(format!(
            "cannot execute {}",
            spec.cache_key()
        )))
    }
}

/// Returns scripted decisions in order, recording every conversation seen.
/// Fails with `Malformed` once the script runs out.
pub struct ScriptedPlanner {
    decisions: Mutex<VecDeque<PlannerDecision>>,
    seen: Mutex<Vec<ConversationState>>,
}

impl ScriptedPlanner {
    pub fn new(decisions: Vec<PlannerDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![PlannerDecision::Answer(text.to_string())])
    }

    /// Conversations passed to `decide`, in call order.
    pub async fn seen(&self) -> Vec<ConversationState> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl PlanningAgent for ScriptedPlanner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(
        &self,
        request: &PlanningRequest<'_>,
    ) -> Result<PlannerDecision, PlanningFailure> {
        self.seen.lock().await.push(request.conversation.clone());
        self.decisions
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| PlanningFailure::Malformed("script exhausted".to_string()))
    }
}

/// Fails every decision with the same failure.
pub struct FailingPlanner {
    failure: PlanningFailure,
}

impl FailingPlanner {
    pub fn new(failure: PlanningFailure) -> Self {
        Self { failure }
    }
}

#[async_trait]
impl PlanningAgent for FailingPlanner {
    fn name(&self) -> &str {
        "failing"
    }

    async fn decide(
        &self,
        _request: &PlanningRequest<'_>,
    ) -> Result<PlannerDecision, PlanningFailure> {
        Err(self.failure.clone())
    }
}

/// Requests a count fetch on every turn and never answers.
#[derive(Default)]
pub struct EndlessPlanner {
    calls: AtomicUsize,
}

impl EndlessPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `decide` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanningAgent for EndlessPlanner {
    fn name(&self) -> &str {
        "endless"
    }

    async fn decide(
        &self,
        _request: &PlanningRequest<'_>,
    ) -> Result<PlannerDecision, PlanningFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PlannerDecision::Fetch(FilterSpec::new(FetchType::Count)))
    }
}

/// Sleeps before answering.
pub struct SlowPlanner {
    delay: Duration,
}

impl SlowPlanner {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PlanningAgent for SlowPlanner {
    fn name(&self) -> &str {
        "slow"
    }

    async fn decide(
        &self,
        _request: &PlanningRequest<'_>,
    ) -> Result<PlannerDecision, PlanningFailure> {
        tokio::time::sleep(self.delay).await;
        Ok(PlannerDecision::Answer("too late".to_string()))
    }
}

/// Panics on its first decision.
pub struct PanickingPlanner;

#[async_trait]
impl PlanningAgent for PanickingPlanner {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn decide(
        &self,
        _request: &PlanningRequest<'_>,
    ) -> Result<PlannerDecision, PlanningFailure> {
        panic!("planner bug");
    }
}

/// Completion client returning scripted outputs and recording requests.
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String, PlanningFailure>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<Result<String, PlanningFailure>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted_completion"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, PlanningFailure> {
        self.requests.lock().await.push(request.clone());
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(PlanningFailure::Service("no scripted response".to_string())))
    }
}
