use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    // the current token is dead; must never be retried with it
    #[error("access token rejected")]
    Auth,

    // the entity no longer exists remotely
    #[error("remote entity not found")]
    NotFound,

    #[error("remote server error (status {0})")]
    Server(u16),

    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected remote response: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Server(_) | RemoteError::Network(_))
    }
}
