use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Io(IoError),

    #[error("local storage quota exceeded")]
    Quota,

    #[error("invalid cache file contents: {0}")]
    Parsing(serde_json::Error),

    #[error("serializing cache contents failed: {0}")]
    Serialization(serde_json::Error),
}

impl From<IoError> for CacheError {
    fn from(e: IoError) -> Self {
        match e.kind() {
            std::io::ErrorKind::StorageFull
                | std::io::ErrorKind::QuotaExceeded => CacheError::Quota,
            _ => CacheError::Io(e),
        }
    }
}
