use std::fmt;

use async_trait::async_trait;
use joebot_models::{FallbackReason, FetchResult, Query, ValidatedSpec};

/// A successful resolution by one tier.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Final answer text, returned verbatim.
    pub text: String,
    /// The last fetch executed, if any. Used for chart attachment.
    pub last: Option<(ValidatedSpec, FetchResult)>,
    pub tool_calls: usize,
}

/// A tier giving up on a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub reason: FallbackReason,
    pub detail: String,
    /// Tool calls executed before giving up.
    pub tool_calls: usize,
}

impl Escalation {
    pub fn new(reason: FallbackReason, detail: impl Into<String>, tool_calls: usize) -> Self {
        Self {
            reason,
            detail: detail.into(),
            tool_calls,
        }
    }
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

/// One fallible tier of the resolution chain. Mockable for testing.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self, query: &Query) -> Result<Resolution, Escalation>;
}
