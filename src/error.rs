use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostitError {
    #[error("Not in a postit workspace. Run 'postit init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .postit/ to reinitialize.")]
    AlreadyInitialized,

    /// The hosting runtime went away; every later storage call fails fast.
    #[error("Storage unavailable for the rest of this session")]
    StorageUnavailable,

    #[error("Storage operation failed: {0}")]
    StorageOpFailed(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PostitError>;
