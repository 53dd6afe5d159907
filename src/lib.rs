pub mod config;
pub mod detection;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parser;
pub mod report;
pub mod store;

pub use config::AnalyzerConfig;
pub use error::{DumpstatError, Result};
pub use ingest::{analyze_file, analyze_text};
pub use models::dto::AnalysisResult;
