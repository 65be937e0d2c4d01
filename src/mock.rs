//! Deterministic in-memory backend for tests and local development.
//!
//! "Encryption" prefixes a tag and "decryption" strips it, so every pair of
//! operations is mutually inverse without any key material or network.

use async_trait::async_trait;

use crate::backend::{CryptoBackend, Operation};
use crate::common::KeyRef;
use crate::error::{ErrorKind, KmsError, KmsResult};

const SYMMETRIC_TAG: &str = "encrypted:";
const ASYMMETRIC_TAG: &str = "asymmetric-encrypted:";
const SIGNATURE_TAG: &str = "signed:";
const MOCK_PARENT: &str = "projects/mock-project/locations/mock-location";

#[derive(Clone, Copy, Debug, Default)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }
}

fn tagged(tag: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.len() + payload.len());
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(payload);
    out
}

fn untag(tag: &str, data: &[u8]) -> Result<String, ErrorKind> {
    let payload = data
        .strip_prefix(tag.as_bytes())
        .ok_or_else(|| ErrorKind::FormatMismatch(format!("missing `{tag}` prefix")))?;
    String::from_utf8(payload.to_vec())
        .map_err(|_| ErrorKind::FormatMismatch("payload is not valid UTF-8".into()))
}

/// Untagged signatures are a format mismatch; a tagged signature over
/// another message fails verification.
fn verify(operation: Operation, key: &KeyRef, message: &[u8], signature: &[u8]) -> KmsResult<bool> {
    let kind = match signature.strip_prefix(SIGNATURE_TAG.as_bytes()) {
        None => ErrorKind::FormatMismatch(format!("missing `{SIGNATURE_TAG}` prefix")),
        Some(signed) if signed == message => return Ok(true),
        Some(_) => ErrorKind::VerificationFailed,
    };
    Err(KmsError::new(operation, key.to_specifier(), kind))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl CryptoBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_key_rings(&self, _project_id: &str, _location: &str) -> KmsResult<Vec<String>> {
        Ok(vec![
            format!("{MOCK_PARENT}/keyRings/key-ring-1"),
            format!("{MOCK_PARENT}/keyRings/key-ring-2"),
        ])
    }

    async fn list_keys(
        &self,
        _project_id: &str,
        _location: &str,
        key_ring: &str,
    ) -> KmsResult<Vec<String>> {
        Ok(vec![
            format!("{MOCK_PARENT}/keyRings/{key_ring}/cryptoKeys/key-1"),
            format!("{MOCK_PARENT}/keyRings/{key_ring}/cryptoKeys/key-2"),
        ])
    }

    async fn encrypt_symmetric(&self, _key: &KeyRef, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        Ok(tagged(SYMMETRIC_TAG, plaintext))
    }

    async fn decrypt_symmetric(&self, key: &KeyRef, ciphertext: &[u8]) -> KmsResult<String> {
        untag(SYMMETRIC_TAG, ciphertext)
            .map_err(|kind| KmsError::new(Operation::DecryptSymmetric, key.to_specifier(), kind))
    }

    async fn encrypt_asymmetric(&self, _key: &KeyRef, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        Ok(tagged(ASYMMETRIC_TAG, plaintext))
    }

    async fn decrypt_asymmetric(&self, key: &KeyRef, ciphertext: &[u8]) -> KmsResult<String> {
        untag(ASYMMETRIC_TAG, ciphertext)
            .map_err(|kind| KmsError::new(Operation::DecryptAsymmetric, key.to_specifier(), kind))
    }

    async fn sign_asymmetric(&self, _key: &KeyRef, message: &[u8]) -> KmsResult<Vec<u8>> {
        Ok(tagged(SIGNATURE_TAG, message))
    }

    async fn verify_asymmetric_ec(
        &self,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool> {
        verify(Operation::VerifyAsymmetricEc, key, message, signature)
    }

    async fn verify_asymmetric_rsa(
        &self,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool> {
        verify(Operation::VerifyAsymmetricRsa, key, message, signature)
    }
}
