use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::rng::testing::make_test_rng;
use super::*;

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
struct Payload {
    title: String,
    body: String,
}

fn make_engine() -> CryptoEngine {
    let mut config = AppConfig::default();
    // full-strength derivation is pointless in tests
    config.pbkdf2_iterations = 1_000;
    CryptoEngine::new(&config, make_test_rng())
        .expect("engine creation failed")
}

fn sample_payload() -> Payload {
    Payload {
        title: "groceries".into(),
        body: "milk\neggs".into(),
    }
}

#[test]
fn encrypt_decrypt_round_trip() {
    let engine = make_engine();
    let payload = sample_payload();
    let blob = engine.encrypt(&payload, "hunter2").expect("encrypt failed");
    let decrypted: Payload = engine.decrypt(&blob, "hunter2")
        .expect("decrypt failed");
    assert_eq!(decrypted, payload);
}

#[test]
fn ciphertext_differs_from_plaintext() {
    let engine = make_engine();
    let blob = engine.encrypt(&"Hello".to_string(), "abc123")
        .expect("encrypt failed");
    assert!(!blob.ciphertext.is_empty());
    assert_ne!(blob.ciphertext, b"Hello");
    assert_eq!(blob.version, BLOB_VERSION);

    let decrypted: String = engine.decrypt(&blob, "abc123")
        .expect("decrypt failed");
    assert_eq!(decrypted, "Hello");

    let err = engine.decrypt::<String>(&blob, "wrong").expect_err("should fail");
    assert!(matches!(err, CryptoError::WrongPassword), "wrong error type: {err:#?}");
}

#[test]
fn decrypt_with_wrong_password_fails() {
    let engine = make_engine();
    let blob = engine.encrypt(&sample_payload(), "first password")
        .expect("encrypt failed");
    let err = engine.decrypt::<Payload>(&blob, "second password")
        .expect_err("should fail");
    assert!(matches!(err, CryptoError::WrongPassword), "wrong error type: {err:#?}");
}

#[test]
fn encrypt_is_not_byte_stable() {
    let engine = make_engine();
    let payload = sample_payload();
    let first = engine.encrypt(&payload, "pw").expect("encrypt failed");
    let second = engine.encrypt(&payload, "pw").expect("encrypt failed");
    assert_ne!(first.ciphertext, second.ciphertext);
}

#[test]
fn tampered_ciphertext_fails_authentication() {
    let engine = make_engine();
    let mut blob = engine.encrypt(&sample_payload(), "pw")
        .expect("encrypt failed");
    let last = blob.ciphertext.len() - 1;
    blob.ciphertext[last] ^= 0xff;
    let err = engine.decrypt::<Payload>(&blob, "pw").expect_err("should fail");
    assert!(matches!(err, CryptoError::WrongPassword), "wrong error type: {err:#?}");
}

#[test]
fn truncated_blob_is_corrupt() {
    let engine = make_engine();
    let mut blob = engine.encrypt(&sample_payload(), "pw")
        .expect("encrypt failed");
    blob.ciphertext.truncate(8);
    let err = engine.decrypt::<Payload>(&blob, "pw").expect_err("should fail");
    assert!(matches!(err, CryptoError::CorruptData), "wrong error type: {err:#?}");
}

#[test]
fn unparseable_plaintext_is_corrupt() {
    let engine = make_engine();
    // decrypts fine, but a string is not a Payload
    let blob = engine.encrypt(&"not an object".to_string(), "pw")
        .expect("encrypt failed");
    let err = engine.decrypt::<Payload>(&blob, "pw").expect_err("should fail");
    assert!(matches!(err, CryptoError::CorruptData), "wrong error type: {err:#?}");
}

#[test]
fn checksum_mismatch_is_corrupt() {
    let engine = make_engine();
    let mut blob = engine.encrypt(&sample_payload(), "pw")
        .expect("encrypt failed");
    blob.checksum = "0000000000000000".into();
    let err = engine.decrypt::<Payload>(&blob, "pw").expect_err("should fail");
    assert!(matches!(err, CryptoError::CorruptData), "wrong error type: {err:#?}");
}

#[test]
fn password_digest_round_trip() {
    let engine = make_engine();
    let digest = engine.hash_password("abc123");
    assert!(engine.verify_password("abc123", &digest));
    assert!(!engine.verify_password("abc124", &digest));
    assert!(!engine.verify_password("abc123", "not a digest"));
}

#[test]
fn checksum_is_stable() {
    assert_eq!(checksum(b"Hello"), checksum(b"Hello"));
    assert_ne!(checksum(b"Hello"), checksum(b"World"));
    assert_eq!(checksum(b"Hello").len(), 16);
}

#[test]
fn blob_serde_round_trip() {
    let engine = make_engine();
    let blob = engine.encrypt(&sample_payload(), "pw").expect("encrypt failed");
    let json = serde_json::to_string(&blob).expect("serialization failed");
    let parsed: EncryptedBlob =
        serde_json::from_str(&json).expect("parsing failed");
    assert_eq!(parsed, blob);
}
