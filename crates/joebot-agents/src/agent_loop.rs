use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use joebot_models::{
    ConversationState, FallbackReason, FetchResult, FilterSchema, FilterSpec, PlannerDecision,
    Query, ValidatedSpec,
};
use tracing::{debug, info};

use crate::error::PlanningFailure;
use crate::fetch::JobFetcher;
use crate::planner::{PlanningAgent, PlanningRequest};
use crate::strategy::{Escalation, Resolution, ResolutionStrategy};

pub const AGENT_STRATEGY: &str = "agent";

/// Where the tool-calling loop is.
#[derive(Debug)]
enum LoopState {
    Planning,
    Fetching(FilterSpec),
    Answering(String),
}

/// The bounded planner/fetcher conversation.
///
/// At most `max_tool_calls` fetches run per query. A request for one more
/// escalates with `TurnLimit` without being executed.
pub struct AgentLoop {
    planner: Arc<dyn PlanningAgent>,
    fetcher: Arc<dyn JobFetcher>,
    schema: Arc<FilterSchema>,
    max_tool_calls: usize,
    decision_timeout: Duration,
}

impl AgentLoop {
    pub fn new(
        planner: Arc<dyn PlanningAgent>,
        fetcher: Arc<dyn JobFetcher>,
        schema: Arc<FilterSchema>,
        max_tool_calls: usize,
        decision_timeout: Duration,
    ) -> Self {
        Self {
            planner,
            fetcher,
            schema,
            max_tool_calls,
            decision_timeout,
        }
    }

    async fn decide(
        &self,
        conversation: &ConversationState,
    ) -> Result<PlannerDecision, PlanningFailure> {
        let request = PlanningRequest {
            conversation,
            remaining_tool_calls: self.max_tool_calls.saturating_sub(conversation.tool_calls()),
        };
        tokio::time::timeout(self.decision_timeout, self.planner.decide(&request))
            .await
            .map_err(|_| PlanningFailure::Timeout(self.decision_timeout))?
    }
}

#[async_trait]
impl ResolutionStrategy for AgentLoop {
    fn name(&self) -> &str {
        AGENT_STRATEGY
    }

    async fn resolve(&self, query: &Query) -> Result<Resolution, Escalation> {
        let mut conversation = ConversationState::new(query.text.clone());
        let mut last: Option<(ValidatedSpec, FetchResult)> = None;
        let mut state = LoopState::Planning;

        loop {
            let calls = conversation.tool_calls();
            state = match state {
                LoopState::Planning => {
                    let started = Instant::now();
                    let decision = self.decide(&conversation).await.map_err(|e| {
                        Escalation::new(FallbackReason::PlanningFailure, e.to_string(), calls)
                    })?;
                    debug!(
                        query_id = %conversation.query_id,
                        planner = %self.planner.name(),
                        elapsed_ms = started.elapsed().as_millis(),
                        "Planner decided"
                    );
                    match decision {
                        PlannerDecision::Fetch(spec) => LoopState::Fetching(spec),
                        PlannerDecision::Answer(text) => LoopState::Answering(text),
                    }
                }
                LoopState::Fetching(spec) => {
                    if calls >= self.max_tool_calls {
                        return Err(Escalation::new(
                            FallbackReason::TurnLimit,
                            format!("planner requested call {} of {}", calls + 1, self.max_tool_calls),
                            calls,
                        ));
                    }
                    let validated = self.schema.validate(spec.clone()).map_err(|e| {
                        Escalation::new(FallbackReason::SchemaViolation, e.to_string(), calls)
                    })?;
                    let result = self.fetcher.fetch(&validated).await.map_err(|e| {
                        Escalation::new(FallbackReason::FetchFailure, e.to_string(), calls)
                    })?;
                    info!(
                        query_id = %conversation.query_id,
                        call_index = conversation.next_index(),
                        fetch_type = %validated.fetch_type(),
                        total_count = result.total_count,
                        "Tool call executed"
                    );
                    conversation.record(spec, result.clone());
                    last = Some((validated, result));
                    LoopState::Planning
                }
                LoopState::Answering(text) => {
                    if text.trim().is_empty() {
                        return Err(Escalation::new(
                            FallbackReason::PlanningFailure,
                            "empty final answer",
                            calls,
                        ));
                    }
                    return Ok(Resolution {
                        text,
                        last,
                        tool_calls: calls,
                    });
                }
            };
        }
    }
}
