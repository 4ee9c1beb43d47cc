pub mod agent_loop;
pub mod chart;
pub mod claude_cli;
pub mod completion;
pub mod error;
pub mod fetch;
pub mod matcher;
pub mod openai_compatible;
pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod prompts;
pub mod render;
pub mod strategy;

pub mod test_support;

pub use agent_loop::AgentLoop;
pub use chart::{ChartArtifact, ChartRenderer, SvgChartRenderer};
pub use claude_cli::ClaudeCliClient;
pub use completion::{CompletionClient, CompletionRequest};
pub use error::{ChartError, PlanningFailure};
pub use fetch::JobFetcher;
pub use matcher::{DeterministicMatcher, MatchOutcome};
pub use openai_compatible::OpenAiCompatibleClient;
pub use orchestrator::{Orchestrator, QueryResponse};
pub use planner::{CompletionPlanner, PlanningAgent, PlanningRequest};
pub use strategy::{Escalation, Resolution, ResolutionStrategy};
