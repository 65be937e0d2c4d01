use std::fmt;

use async_trait::async_trait;

use crate::common::KeyRef;
use crate::error::KmsResult;

/// Operations a backend can perform, used to tag errors and spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListKeyRings,
    ListKeys,
    EncryptSymmetric,
    DecryptSymmetric,
    EncryptAsymmetric,
    DecryptAsymmetric,
    SignAsymmetric,
    VerifyAsymmetricEc,
    VerifyAsymmetricRsa,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListKeyRings => "list_key_rings",
            Operation::ListKeys => "list_keys",
            Operation::EncryptSymmetric => "encrypt_symmetric",
            Operation::DecryptSymmetric => "decrypt_symmetric",
            Operation::EncryptAsymmetric => "encrypt_asymmetric",
            Operation::DecryptAsymmetric => "decrypt_asymmetric",
            Operation::SignAsymmetric => "sign_asymmetric",
            Operation::VerifyAsymmetricEc => "verify_asymmetric_ec",
            Operation::VerifyAsymmetricRsa => "verify_asymmetric_rsa",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The crypto capability behind [`crate::KmsFacade`].
///
/// Implementations hold no per-call state and must tolerate concurrent calls.
/// Verification never yields `Ok(false)`: a signature that does not validate
/// is reported as [`crate::ErrorKind::VerificationFailed`].
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CryptoBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Full names of every key ring under `projects/{project_id}/locations/{location}`,
    /// in service order.
    async fn list_key_rings(&self, project_id: &str, location: &str) -> KmsResult<Vec<String>>;

    /// Full names of every crypto key in a key ring, in service order.
    async fn list_keys(
        &self,
        project_id: &str,
        location: &str,
        key_ring: &str,
    ) -> KmsResult<Vec<String>>;

    async fn encrypt_symmetric(&self, key: &KeyRef, plaintext: &[u8]) -> KmsResult<Vec<u8>>;

    async fn decrypt_symmetric(&self, key: &KeyRef, ciphertext: &[u8]) -> KmsResult<String>;

    async fn encrypt_asymmetric(&self, key: &KeyRef, plaintext: &[u8]) -> KmsResult<Vec<u8>>;

    async fn decrypt_asymmetric(&self, key: &KeyRef, ciphertext: &[u8]) -> KmsResult<String>;

    async fn sign_asymmetric(&self, key: &KeyRef, message: &[u8]) -> KmsResult<Vec<u8>>;

    async fn verify_asymmetric_ec(
        &self,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool>;

    async fn verify_asymmetric_rsa(
        &self,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool>;
}
