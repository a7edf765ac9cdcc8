use thiserror::Error;
use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("session expired")]
    Expired,

    #[error(transparent)]
    Cache(#[from] CacheError),
}
