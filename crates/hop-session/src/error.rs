use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
