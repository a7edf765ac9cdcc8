mod errors;
#[cfg(test)] mod tests;

pub use errors::CryptoError;

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit},
};
use argon2::{Algorithm, Argon2, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use argon2::password_hash::SaltString;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::rng::SyncRng;

const KEY_SIZE: usize = 32;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;

pub const BLOB_VERSION: &str = "1";

// fixed application-level salt: the digest is only compared locally for
// verification prompts and never leaves the machine
const PASSWORD_HASH_SALT: &[u8] = b"drivenotes-local";

/// The envelope actually written to a remote file: salt and nonce travel
/// inside `ciphertext`, the checksum covers the serialized plaintext.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "crate::serde::base64_vec")]
    pub ciphertext: Vec<u8>,
    pub checksum: String,
    pub version: String,
}

pub struct CryptoEngine {
    argon2_params: argon2::Params,
    pbkdf2_iterations: u32,
    rng: SyncRng<StdRng>,
}

impl CryptoEngine {
    pub fn new(
        config: &AppConfig,
        rng: SyncRng<StdRng>,
    ) -> Result<CryptoEngine, CryptoError> {
        Ok(
            CryptoEngine {
                argon2_params: config.hasher_config
                    .clone()
                    .try_into()
                    .map_err(CryptoError::HasherParams)?,
                pbkdf2_iterations: config.pbkdf2_iterations,
                rng,
            }
        )
    }

    /// Serializes `value` to canonical JSON and encrypts it with a key
    /// derived from `password`. Salt and nonce are random per call, so the
    /// output is not byte-stable.
    pub fn encrypt<T: Serialize>(
        &self,
        value: &T,
        password: &str,
    ) -> Result<EncryptedBlob, CryptoError> {
        let plaintext = serde_json::to_vec(value)?;
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        {
            let mut rng = self.rng.get_rng();
            rng.fill_bytes(&mut salt);
            rng.fill_bytes(&mut nonce);
        }
        let key = self.derive_key(password, &salt);
        let cipher = Aes256Gcm::new(&key.into());
        let encrypted = cipher.encrypt(&nonce.into(), plaintext.as_slice())
            .map_err(|_| CryptoError::Encryption)?;

        let mut ciphertext =
            Vec::with_capacity(SALT_SIZE + NONCE_SIZE + encrypted.len());
        ciphertext.extend_from_slice(&salt);
        ciphertext.extend_from_slice(&nonce);
        ciphertext.extend_from_slice(&encrypted);
        Ok(
            EncryptedBlob {
                ciphertext,
                checksum: checksum(&plaintext),
                version: BLOB_VERSION.into(),
            }
        )
    }

    /// The cipher cannot distinguish a bad key from tampered input, so any
    /// authentication failure (or an empty result) is reported as
    /// `WrongPassword`; output that decrypts but does not parse, or whose
    /// checksum disagrees, is `CorruptData`.
    pub fn decrypt<T: DeserializeOwned>(
        &self,
        blob: &EncryptedBlob,
        password: &str,
    ) -> Result<T, CryptoError> {
        if blob.ciphertext.len() < SALT_SIZE + NONCE_SIZE {
            return Err(CryptoError::CorruptData);
        }
        let (salt, rest) = blob.ciphertext.split_at(SALT_SIZE);
        let (nonce, encrypted) = rest.split_at(NONCE_SIZE);
        let key = self.derive_key(password, salt);
        let cipher = Aes256Gcm::new(&key.into());
        let plaintext = cipher
            .decrypt(nonce.into(), encrypted)
            .map_err(|_| CryptoError::WrongPassword)?;
        if plaintext.is_empty() {
            return Err(CryptoError::WrongPassword);
        }
        if checksum(&plaintext) != blob.checksum {
            return Err(CryptoError::CorruptData);
        }
        serde_json::from_slice(&plaintext)
            .map_err(|_| CryptoError::CorruptData)
    }

    /// One-way digest for local verification prompts; never transmitted.
    pub fn hash_password(&self, password: &str) -> String {
        let salt = SaltString::encode_b64(PASSWORD_HASH_SALT)
            .expect("salt encoding failed");
        self.get_hasher()
            .hash_password(password.as_bytes(), &salt)
            .expect("password hashing failed")
            .serialize()
            .to_string()
    }

    pub fn verify_password(&self, password: &str, digest: &str) -> bool {
        PasswordHash::new(digest)
            .map(|hash|
                hash.verify_password(&[&self.get_hasher()], password).is_ok()
            )
            .unwrap_or(false)
    }

    fn get_hasher(&self) -> Argon2<'_> {
        Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            self.argon2_params.clone(),
        )
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            salt,
            self.pbkdf2_iterations,
            &mut key,
        );
        key
    }
}

/// Integrity signal used to detect corruption after decrypt; not a
/// security control.
pub fn checksum(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}
