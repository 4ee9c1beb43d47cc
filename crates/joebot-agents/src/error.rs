use std::time::Duration;

use thiserror::Error;

/// Any reason the planning agent could not produce a decision.
///
/// The planner never retries or falls back on its own; the orchestrator
/// treats every variant the same way and escalates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningFailure {
    #[error("Completion request failed: {0}")]
    Network(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with an error (auth, quota, model unavailable).
    #[error("Completion service error: {0}")]
    Service(String),

    #[error("Malformed planner output: {0}")]
    Malformed(String),
}

impl PlanningFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanningFailure::Network(_) => "network",
            PlanningFailure::Timeout(_) => "timeout",
            PlanningFailure::Service(_) => "service",
            PlanningFailure::Malformed(_) => "malformed",
        }
    }
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Nothing to chart: {0}")]
    Empty(String),

    #[error("Chart I/O error: {0}")]
    Io(#[from] std::io::Error),
}
