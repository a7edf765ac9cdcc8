use thiserror::Error;
use uuid::Uuid;

use crate::cache::CacheError;
use crate::crypto::CryptoError;
use crate::remote::RemoteError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("notebook {0} does not exist")]
    NotebookNotFound(Uuid),

    #[error("note {0} does not exist")]
    NoteNotFound(Uuid),

    #[error("note {0} is not orphaned")]
    NotOrphaned(Uuid),

    #[error("no encryption password configured")]
    EncryptionPasswordNotSet,

    #[error("the note is password protected")]
    PasswordRequired,

    #[error("operation abandoned after logout")]
    Cancelled,
}
