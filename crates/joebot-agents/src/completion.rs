use async_trait::async_trait;

use crate::error::PlanningFailure;

/// One request to a text-completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

/// A text-completion backend. Mockable for testing.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Returns the raw completion text. Exactly one outbound request.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PlanningFailure>;
}
