use std::sync::Arc;

use async_trait::async_trait;
use joebot_models::{ConversationState, FilterSchema, PlannerDecision};
use tracing::debug;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::error::PlanningFailure;
use crate::parser::parse_planner_output;
use crate::prompts::{planner_system_prompt, planner_user_prompt};

/// Everything the planner sees for one decision.
#[derive(Debug, Clone, Copy)]
pub struct PlanningRequest<'a> {
    pub conversation: &'a ConversationState,
    pub remaining_tool_calls: usize,
}

/// Trait for planning agents. Mockable for testing.
///
/// Implementations are stateless across queries and never retry: every
/// failure is returned to the caller as a `PlanningFailure`.
#[async_trait]
pub trait PlanningAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(&self, request: &PlanningRequest<'_>)
        -> Result<PlannerDecision, PlanningFailure>;
}

/// A planning agent backed by a text-completion service.
pub struct CompletionPlanner {
    client: Arc<dyn CompletionClient>,
    system_prompt: String,
    temperature: f32,
}

impl CompletionPlanner {
    pub fn new(client: Arc<dyn CompletionClient>, schema: &FilterSchema, temperature: f32) -> Self {
        Self {
            client,
            system_prompt: planner_system_prompt(schema),
            temperature,
        }
    }
}

#[async_trait]
impl PlanningAgent for CompletionPlanner {
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn decide(
        &self,
        request: &PlanningRequest<'_>,
    ) -> Result<PlannerDecision, PlanningFailure> {
        let completion = CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            user_prompt: planner_user_prompt(request.conversation, request.remaining_tool_calls),
            temperature: self.temperature,
        };
        let raw_output = self.client.complete(&completion).await?;
        debug!(
            query_id = %request.conversation.query_id,
            backend = %self.client.name(),
            length = raw_output.len(),
            "Planner completion received"
        );
        parse_planner_output(&raw_output)
    }
}
