pub mod cache;
pub mod error;
pub mod fetcher;
pub mod sqlite;
pub mod store;
pub mod vocabulary;

pub use cache::ResultCache;
pub use error::StoreError;
pub use fetcher::Fetcher;
pub use sqlite::SqliteSource;
pub use store::RecordStore;
pub use vocabulary::Vocabulary;
