use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fetch_result::FetchResult;
use crate::filter::FilterSpec;

/// One fetch requested by the planning agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    /// 1-based position within the query's conversation.
    pub index: usize,
    pub spec: FilterSpec,
}

/// A tool call paired with the result fed back to the planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    pub call: ToolCall,
    pub result: FetchResult,
}

/// What the planner decided on one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerDecision {
    Fetch(FilterSpec),
    Answer(String),
}

/// Per-query conversation history. Owned by exactly one resolution and
/// dropped when the query resolves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationState {
    pub query_id: Uuid,
    pub query: String,
    pub exchanges: Vec<Exchange>,
}

impl ConversationState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            query: query.into(),
            exchanges: Vec::new(),
        }
    }

    pub fn tool_calls(&self) -> usize {
        self.exchanges.len()
    }

    /// Index for the next tool call.
    pub fn next_index(&self) -> usize {
        self.exchanges.len() + 1
    }

    pub fn record(&mut self, spec: FilterSpec, result: FetchResult) -> &Exchange {
        let call = ToolCall {
            index: self.next_index(),
            spec,
        };
        self.exchanges.push(Exchange { call, result });
        &self.exchanges[self.exchanges.len() - 1]
    }

    pub fn last(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }
}
