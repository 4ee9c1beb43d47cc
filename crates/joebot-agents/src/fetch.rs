use async_trait::async_trait;
use joebot_models::{FetchResult, ValidatedSpec};
use joebot_store::{Fetcher, StoreError};

/// Executes validated requests for the agent loop and the deterministic path.
#[async_trait]
pub trait JobFetcher: Send + Sync {
    async fn fetch(&self, spec: &ValidatedSpec) -> Result<FetchResult, StoreError>;
}

#[async_trait]
impl JobFetcher for Fetcher {
    async fn fetch(&self, spec: &ValidatedSpec) -> Result<FetchResult, StoreError> {
        Fetcher::fetch(self, spec).await
    }
}
