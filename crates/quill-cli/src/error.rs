use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No {0} provided")]
    EmptyContent(&'static str),
    #[error("Invalid post id: {0}")]
    InvalidPostId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("An author is required. Pass --author-id or set QUILL_AUTHOR_ID.")]
    AuthorRequired,
}
