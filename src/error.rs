use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpstatError {
    #[error("cannot read capture file {path}: {source}")]
    CaptureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DumpstatError>;
