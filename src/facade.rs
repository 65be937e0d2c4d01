//! [`KmsFacade`]: the single entry point for callers.
//!
//! The facade binds one [`CryptoBackend`] at construction and forwards the
//! nine operations unchanged. It adds caller cancellation and an optional
//! per-call deadline; it never retries, caches or reorders.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{CryptoBackend, Operation};
use crate::common::{key_ring_path, location_path, KeyRef};
use crate::error::{ErrorKind, KmsError, KmsResult};
use crate::mock::MockBackend;
use crate::remote::RemoteBackend;

#[derive(Clone)]
pub struct KmsFacade {
    backend: Arc<dyn CryptoBackend>,
    deadline: Option<Duration>,
}

impl std::fmt::Debug for KmsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsFacade")
            .field("backend", &self.backend.name())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl KmsFacade {
    pub fn new(backend: Arc<dyn CryptoBackend>) -> Self {
        Self {
            backend,
            deadline: None,
        }
    }

    pub fn remote(backend: RemoteBackend) -> Self {
        Self::new(Arc::new(backend))
    }

    pub fn mock() -> Self {
        Self::new(Arc::new(MockBackend::new()))
    }

    /// Fail any call still running after `deadline` with
    /// [`ErrorKind::DeadlineExceeded`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Drive one backend call to completion unless `cancel` fires or the
    /// deadline passes first. The losing future is dropped, which aborts any
    /// in-flight request.
    async fn call<T, F>(
        &self,
        operation: Operation,
        resource: &str,
        cancel: &CancellationToken,
        fut: F,
    ) -> KmsResult<T>
    where
        F: Future<Output = KmsResult<T>>,
    {
        debug!(%operation, resource, backend = self.backend.name(), "kms call");

        let guarded = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(KmsError::new(operation, resource, ErrorKind::DeadlineExceeded)),
                },
                None => fut.await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(KmsError::new(operation, resource, ErrorKind::Cancelled)),
            result = guarded => result,
        };

        match &result {
            Ok(_) => debug!(%operation, resource, "kms call succeeded"),
            Err(err) => debug!(%operation, resource, error = %err.kind, "kms call failed"),
        }
        result
    }

    pub async fn list_key_rings(
        &self,
        cancel: &CancellationToken,
        project_id: &str,
        location: &str,
    ) -> KmsResult<Vec<String>> {
        let parent = location_path(project_id, location);
        self.call(
            Operation::ListKeyRings,
            &parent,
            cancel,
            self.backend.list_key_rings(project_id, location),
        )
        .await
    }

    pub async fn list_keys(
        &self,
        cancel: &CancellationToken,
        project_id: &str,
        location: &str,
        key_ring: &str,
    ) -> KmsResult<Vec<String>> {
        let parent = key_ring_path(project_id, location, key_ring);
        self.call(
            Operation::ListKeys,
            &parent,
            cancel,
            self.backend.list_keys(project_id, location, key_ring),
        )
        .await
    }

    pub async fn encrypt_symmetric(
        &self,
        cancel: &CancellationToken,
        key: &KeyRef,
        plaintext: &[u8],
    ) -> KmsResult<Vec<u8>> {
        self.call(
            Operation::EncryptSymmetric,
            &key.to_specifier(),
            cancel,
            self.backend.encrypt_symmetric(key, plaintext),
        )
        .await
    }

    pub async fn decrypt_symmetric(
        &self,
        cancel: &CancellationToken,
        key: &KeyRef,
        ciphertext: &[u8],
    ) -> KmsResult<String> {
        self.call(
            Operation::DecryptSymmetric,
            &key.to_specifier(),
            cancel,
            self.backend.decrypt_symmetric(key, ciphertext),
        )
        .await
    }

    pub async fn encrypt_asymmetric(
        &self,
        cancel: &CancellationToken,
        key: &KeyRef,
        plaintext: &[u8],
    ) -> KmsResult<Vec<u8>> {
        self.call(
            Operation::EncryptAsymmetric,
            &key.to_specifier(),
            cancel,
            self.backend.encrypt_asymmetric(key, plaintext),
        )
        .await
    }

    pub async fn decrypt_asymmetric(
        &self,
        cancel: &CancellationToken,
        key: &KeyRef,
        ciphertext: &[u8],
    ) -> KmsResult<String> {
        self.call(
            Operation::DecryptAsymmetric,
            &key.to_specifier(),
            cancel,
            self.backend.decrypt_asymmetric(key, ciphertext),
        )
        .await
    }

    pub async fn sign_asymmetric(
        &self,
        cancel: &CancellationToken,
        key: &KeyRef,
        message: &[u8],
    ) -> KmsResult<Vec<u8>> {
        self.call(
            Operation::SignAsymmetric,
            &key.to_specifier(),
            cancel,
            self.backend.sign_asymmetric(key, message),
        )
        .await
    }

    /// `Ok(true)` when the signature validates; any other outcome is an error.
    pub async fn verify_asymmetric_ec(
        &self,
        cancel: &CancellationToken,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool> {
        self.call(
            Operation::VerifyAsymmetricEc,
            &key.to_specifier(),
            cancel,
            self.backend.verify_asymmetric_ec(key, message, signature),
        )
        .await
    }

    /// `Ok(true)` when the signature validates; any other outcome is an error.
    pub async fn verify_asymmetric_rsa(
        &self,
        cancel: &CancellationToken,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool> {
        self.call(
            Operation::VerifyAsymmetricRsa,
            &key.to_specifier(),
            cancel,
            self.backend.verify_asymmetric_rsa(key, message, signature),
        )
        .await
    }
}
