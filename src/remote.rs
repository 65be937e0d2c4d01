//! Cloud KMS REST backend.
//!
//! Every call that carries key-protected bytes over the wire is tagged with a
//! CRC32C checksum, and every response is checked against the checksum the
//! service returns for it. Asymmetric encryption and signature verification
//! only need the public key, so those run locally after a key fetch.

use async_trait::async_trait;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::backend::{CryptoBackend, Operation};
use crate::checksum::{crc32c_i64, verify_crc32c};
use crate::common::{
    key_ring_path, location_path, DecryptRequest, DecryptResponse, Digest, EncryptRequest,
    EncryptResponse, ErrorEnvelope, KeyRef, ListCryptoKeysResponse, ListKeyRingsResponse, Named,
    PublicKeyResponse, SignRequest, SignResponse,
};
use crate::error::{ErrorKind, IntegrityViolation, KmsError, KmsResult};
use crate::keys::{sha256, PublicKey};

pub const KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com/v1";

#[derive(Clone, Debug)]
pub struct RemoteBackend {
    // client with oauth2 token
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteBackend {
    pub fn new_with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: KMS_ENDPOINT.to_string(),
        }
    }

    /// Point the backend at another API root, e.g. a local emulator.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn get_public_key(&self, name: &str) -> Result<PublicKey, ErrorKind> {
        let url = format!("{}/{}/publicKey", self.endpoint, name);
        let response: PublicKeyResponse = read(self.client.get(url).send().await?).await?;

        if let Some(claimed) = response.pem_crc32c {
            if !verify_crc32c(response.pem.as_bytes(), claimed) {
                return Err(ErrorKind::Integrity(IntegrityViolation::ResponseChecksumMismatch));
            }
        }
        debug!(algorithm = %response.algorithm, "fetched public key");
        PublicKey::from_pem(&response.pem)
    }

    async fn post<B, T>(&self, name: &str, method: &str, body: &B) -> Result<T, ErrorKind>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}:{}", self.endpoint, name, method);
        read(self.client.post(url).json(body).send().await?).await
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    async fn list_all<P: Page>(&self, parent: &str, collection: &str) -> Result<Vec<String>, ErrorKind> {
        let url = format!("{}/{}/{}", self.endpoint, parent, collection);
        let mut names = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut request = self.client.get(&url);
            if !page_token.is_empty() {
                request = request.query(&[("pageToken", page_token.as_str())]);
            }
            let page: P = read(request.send().await?).await?;
            let (items, next_page_token) = page.into_parts();
            names.extend(items.into_iter().map(|item| item.name));

            if next_page_token.is_empty() {
                break;
            }
            if next_page_token == page_token {
                return Err(ErrorKind::Decode(format!(
                    "listing {parent}/{collection} repeated page token {page_token:?}"
                )));
            }
            page_token = next_page_token;
        }

        debug!(parent, count = names.len(), "listed");
        Ok(names)
    }

    async fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<Vec<u8>, ErrorKind> {
        let request = EncryptRequest {
            plaintext: plaintext.to_vec(),
            plaintext_crc32c: Some(crc32c_i64(plaintext)),
        };
        let response: EncryptResponse = self.post(name, "encrypt", &request).await?;

        if !response.verified_plaintext_crc32c {
            return Err(ErrorKind::Integrity(IntegrityViolation::RequestNotVerified));
        }
        check_response(&response.ciphertext, response.ciphertext_crc32c)?;
        Ok(response.ciphertext)
    }

    async fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<String, ErrorKind> {
        let request = DecryptRequest {
            ciphertext: ciphertext.to_vec(),
            ciphertext_crc32c: Some(crc32c_i64(ciphertext)),
        };
        let response: DecryptResponse = self.post(name, "decrypt", &request).await?;

        check_response(&response.plaintext, response.plaintext_crc32c)?;
        into_text(response.plaintext)
    }

    async fn asymmetric_decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<String, ErrorKind> {
        let request = DecryptRequest {
            ciphertext: ciphertext.to_vec(),
            ciphertext_crc32c: Some(crc32c_i64(ciphertext)),
        };
        let response: DecryptResponse = self.post(name, "asymmetricDecrypt", &request).await?;

        if !response.verified_ciphertext_crc32c {
            return Err(ErrorKind::Integrity(IntegrityViolation::RequestNotVerified));
        }
        check_response(&response.plaintext, response.plaintext_crc32c)?;
        into_text(response.plaintext)
    }

    async fn asymmetric_sign(&self, name: &str, message: &[u8]) -> Result<Vec<u8>, ErrorKind> {
        let digest = sha256(message);
        let request = SignRequest {
            digest: Digest::Sha256(BASE64_STANDARD.encode(digest)),
            digest_crc32c: Some(crc32c_i64(&digest)),
        };
        let response: SignResponse = self.post(name, "asymmetricSign", &request).await?;

        if !response.verified_digest_crc32c {
            return Err(ErrorKind::Integrity(IntegrityViolation::RequestNotVerified));
        }
        if response.name != name {
            return Err(ErrorKind::Integrity(IntegrityViolation::ResponseNameMismatch));
        }
        check_response(&response.signature, response.signature_crc32c)?;
        Ok(response.signature)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl CryptoBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip(self))]
    async fn list_key_rings(&self, project_id: &str, location: &str) -> KmsResult<Vec<String>> {
        let parent = location_path(project_id, location);
        self.list_all::<ListKeyRingsResponse>(&parent, "keyRings")
            .await
            .map_err(context(Operation::ListKeyRings, &parent))
    }

    #[instrument(skip(self))]
    async fn list_keys(
        &self,
        project_id: &str,
        location: &str,
        key_ring: &str,
    ) -> KmsResult<Vec<String>> {
        let parent = key_ring_path(project_id, location, key_ring);
        self.list_all::<ListCryptoKeysResponse>(&parent, "cryptoKeys")
            .await
            .map_err(context(Operation::ListKeys, &parent))
    }

    #[instrument(skip(self, plaintext), fields(key = %key))]
    async fn encrypt_symmetric(&self, key: &KeyRef, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        let name = key.to_specifier();
        self.encrypt(&name, plaintext)
            .await
            .map_err(context(Operation::EncryptSymmetric, &name))
    }

    #[instrument(skip(self, ciphertext), fields(key = %key))]
    async fn decrypt_symmetric(&self, key: &KeyRef, ciphertext: &[u8]) -> KmsResult<String> {
        let name = key.to_specifier();
        self.decrypt(&name, ciphertext)
            .await
            .map_err(context(Operation::DecryptSymmetric, &name))
    }

    #[instrument(skip(self, plaintext), fields(key = %key))]
    async fn encrypt_asymmetric(&self, key: &KeyRef, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        let name = key.to_specifier();
        let result = match self.get_public_key(&name).await {
            Ok(public_key) => public_key.encrypt_oaep(plaintext),
            Err(kind) => Err(kind),
        };
        result.map_err(context(Operation::EncryptAsymmetric, &name))
    }

    #[instrument(skip(self, ciphertext), fields(key = %key))]
    async fn decrypt_asymmetric(&self, key: &KeyRef, ciphertext: &[u8]) -> KmsResult<String> {
        let name = key.to_specifier();
        self.asymmetric_decrypt(&name, ciphertext)
            .await
            .map_err(context(Operation::DecryptAsymmetric, &name))
    }

    #[instrument(skip(self, message), fields(key = %key))]
    async fn sign_asymmetric(&self, key: &KeyRef, message: &[u8]) -> KmsResult<Vec<u8>> {
        let name = key.to_specifier();
        self.asymmetric_sign(&name, message)
            .await
            .map_err(context(Operation::SignAsymmetric, &name))
    }

    #[instrument(skip(self, message, signature), fields(key = %key))]
    async fn verify_asymmetric_ec(
        &self,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool> {
        let name = key.to_specifier();
        let result = match self.get_public_key(&name).await {
            Ok(public_key) => public_key.verify_ecdsa(message, signature),
            Err(kind) => Err(kind),
        };
        result
            .map(|()| true)
            .map_err(context(Operation::VerifyAsymmetricEc, &name))
    }

    #[instrument(skip(self, message, signature), fields(key = %key))]
    async fn verify_asymmetric_rsa(
        &self,
        key: &KeyRef,
        message: &[u8],
        signature: &[u8],
    ) -> KmsResult<bool> {
        let name = key.to_specifier();
        let result = match self.get_public_key(&name).await {
            Ok(public_key) => public_key.verify_pss(message, signature),
            Err(kind) => Err(kind),
        };
        result
            .map(|()| true)
            .map_err(context(Operation::VerifyAsymmetricRsa, &name))
    }
}

/// One page of a list call.
trait Page: DeserializeOwned {
    fn into_parts(self) -> (Vec<Named>, String);
}

impl Page for ListKeyRingsResponse {
    fn into_parts(self) -> (Vec<Named>, String) {
        (self.key_rings, self.next_page_token)
    }
}

impl Page for ListCryptoKeysResponse {
    fn into_parts(self) -> (Vec<Named>, String) {
        (self.crypto_keys, self.next_page_token)
    }
}

async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ErrorKind> {
    let status = response.status();
    if !status.is_success() {
        let message = match response.text().await {
            Ok(text) => serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text),
            Err(e) => format!("error body unreadable: {e}"),
        };
        return Err(ErrorKind::Status {
            code: status.as_u16(),
            message,
        });
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ErrorKind::Decode(e.to_string()))
}

fn check_response(data: &[u8], claimed: Option<i64>) -> Result<(), ErrorKind> {
    match claimed {
        None => Err(ErrorKind::Integrity(IntegrityViolation::MissingChecksum)),
        Some(claimed) if !verify_crc32c(data, claimed) => Err(ErrorKind::Integrity(
            IntegrityViolation::ResponseChecksumMismatch,
        )),
        Some(_) => Ok(()),
    }
}

fn into_text(plaintext: Vec<u8>) -> Result<String, ErrorKind> {
    String::from_utf8(plaintext).map_err(|_| ErrorKind::InvalidPlaintext)
}

fn context(operation: Operation, resource: &str) -> impl FnOnce(ErrorKind) -> KmsError + '_ {
    move |kind| {
        if let ErrorKind::Integrity(violation) = &kind {
            warn!(%operation, resource, %violation, "integrity check failed");
        }
        KmsError::new(operation, resource, kind)
    }
}
