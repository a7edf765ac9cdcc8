use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    // recoverable by re-prompting
    #[error("wrong password")]
    WrongPassword,

    // fatal to the entity
    #[error("decrypted payload is corrupt")]
    CorruptData,

    #[error("encryption failed")]
    Encryption,

    #[error("invalid hasher parameters: {0}")]
    HasherParams(argon2::Error),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
