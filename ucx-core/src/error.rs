use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Library root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("Failed to walk library directory {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read library file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Library load already started")]
    AlreadyStarted,

    #[error("Library load was cancelled")]
    Cancelled,

    #[error("Library loader task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid initialization options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("Document cache size must be at least 1")]
    ZeroCacheSize,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document not open: {0}")]
    NotOpen(lsp_types::Url),

    #[error("Stale version for {uri}: {received} < {current}")]
    StaleVersion {
        uri: lsp_types::Url,
        received: i32,
        current: i32,
    },

    #[error("Change range starts past the end of {uri}: line {line} of {line_count}")]
    InvalidChange {
        uri: lsp_types::Url,
        line: u32,
        line_count: u32,
    },
}
