pub mod config;
pub mod error;
pub mod importer;
pub mod writer;

pub use config::LoaderConfig;
pub use error::LoaderError;
pub use importer::{import_dir, ImportSummary};
pub use writer::JobWriter;
