//! Error type for the summary engine and its CLI.

use std::path::PathBuf;

use goldbach_core::GoldbachError;

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error(transparent)]
    Core(#[from] GoldbachError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no cps summary row in {} matches a configured alpha", .0.display())]
    ResumeEmpty(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SummaryError>;
