pub mod config;
pub mod conversation;
pub mod fetch_result;
pub mod filter;
pub mod job_record;
pub mod query;
pub mod schema;
pub mod text;

pub use config::{
    AgentsConfig, ChartsConfig, CompletionBackend, JoebotConfig, SchemaConfig, StoreConfig,
};
pub use conversation::{ConversationState, Exchange, PlannerDecision, ToolCall};
pub use fetch_result::{AggregateEntry, FetchResult, UNKNOWN_GROUP};
pub use filter::{FetchType, FilterSpec, FilterValue, MatcherConfidence, ScalarValue};
pub use job_record::{JobRecord, RecordProjection, JOBS_COLUMNS, JOBS_TABLE_DDL};
pub use query::{FallbackReason, Query, ResolutionPath};
pub use schema::{
    CompareArm, Condition, FilterField, FilterSchema, SchemaViolation, ValidatedSpec,
};
