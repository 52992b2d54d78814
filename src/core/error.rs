//! Fatal error taxonomy
//!
//! Only root-level preconditions abort a run. Anything that goes wrong for a
//! single entry is a [`Warning`](crate::core::model::Warning) instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid processing directory '{}'", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(err: zip::result::ZipError) -> Self {
        ExtractError::Archive(err.to_string())
    }
}
