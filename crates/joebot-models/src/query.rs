use std::fmt;

use serde::{Deserialize, Serialize};

/// One inbound question. `session_id` is opaque to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    pub session_id: String,
    pub text: String,
}

impl Query {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            text: text.into(),
        }
    }
}

/// Why a query was answered by the deterministic path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    AgentDisabled,
    HelpRequested,
    PlanningFailure,
    SchemaViolation,
    TurnLimit,
    FetchFailure,
    StrategyPanicked,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::AgentDisabled => "agent_disabled",
            FallbackReason::HelpRequested => "help_requested",
            FallbackReason::PlanningFailure => "planning_failure",
            FallbackReason::SchemaViolation => "schema_violation",
            FallbackReason::TurnLimit => "turn_limit",
            FallbackReason::FetchFailure => "fetch_failure",
            FallbackReason::StrategyPanicked => "strategy_panicked",
        }
    }

    /// False for fallbacks that were chosen rather than forced.
    pub fn is_failure(self) -> bool {
        !matches!(
            self,
            FallbackReason::AgentDisabled | FallbackReason::HelpRequested
        )
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a response was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum ResolutionPath {
    /// A resolution strategy produced the answer.
    Strategy { name: String },
    Fallback { reason: FallbackReason },
}

impl ResolutionPath {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ResolutionPath::Fallback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_path_serializes_with_reason() {
        let path = ResolutionPath::Fallback {
            reason: FallbackReason::TurnLimit,
        };
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"path": "fallback", "reason": "turn_limit"})
        );
        assert!(path.is_fallback());
    }

    #[test]
    fn only_forced_fallbacks_are_failures() {
        assert!(!FallbackReason::AgentDisabled.is_failure());
        assert!(!FallbackReason::HelpRequested.is_failure());
        assert!(FallbackReason::TurnLimit.is_failure());
        assert!(FallbackReason::StrategyPanicked.is_failure());
    }

    #[test]
    fn reason_display_matches_serde_name() {
        for reason in [
            FallbackReason::AgentDisabled,
            FallbackReason::PlanningFailure,
            FallbackReason::StrategyPanicked,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{reason}\""));
        }
    }
}
