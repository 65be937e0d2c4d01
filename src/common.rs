use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Address of a Cloud KMS crypto key, optionally pinned to one version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyRef {
    pub project_id: String,
    pub location: String,
    pub key_ring: String,
    pub key_name: String,
    pub version: Option<String>,
}

impl KeyRef {
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        key_ring: impl Into<String>,
        key_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            key_ring: key_ring.into(),
            key_name: key_name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Canonical resource name. Fields are used verbatim; the service is the
    /// one that rejects malformed names.
    pub fn to_specifier(&self) -> String {
        let key = format!(
            "{}/cryptoKeys/{}",
            key_ring_path(&self.project_id, &self.location, &self.key_ring),
            self.key_name
        );
        match &self.version {
            Some(version) => format!("{key}/cryptoKeyVersions/{version}"),
            None => key,
        }
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_specifier())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a crypto key resource name: {0}")]
pub struct ParseKeyRefError(pub String);

impl FromStr for KeyRef {
    type Err = ParseKeyRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let invalid = || ParseKeyRefError(s.to_string());
        let segment = |i: usize| -> Result<String, ParseKeyRefError> {
            match parts.get(i) {
                Some(value) if !value.is_empty() => Ok((*value).to_string()),
                _ => Err(invalid()),
            }
        };

        let labels = [(0, "projects"), (2, "locations"), (4, "keyRings"), (6, "cryptoKeys")];
        if !(parts.len() == 8 || parts.len() == 10)
            || labels.iter().any(|(i, label)| parts[*i] != *label)
        {
            return Err(invalid());
        }

        let mut key = KeyRef::new(segment(1)?, segment(3)?, segment(5)?, segment(7)?);
        if parts.len() == 10 {
            if parts[8] != "cryptoKeyVersions" {
                return Err(invalid());
            }
            key.version = Some(segment(9)?);
        }
        Ok(key)
    }
}

/// Parent of key rings: `projects/{p}/locations/{l}`.
pub fn location_path(project_id: &str, location: &str) -> String {
    format!("projects/{project_id}/locations/{location}")
}

/// Parent of crypto keys: `projects/{p}/locations/{l}/keyRings/{r}`.
pub fn key_ring_path(project_id: &str, location: &str, key_ring: &str) -> String {
    format!("{}/keyRings/{key_ring}", location_path(project_id, location))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "lowercase")]
pub enum Digest {
    Sha256(String),
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub digest: Digest,
    #[serde(with = "int64_string", skip_serializing_if = "Option::is_none")]
    pub digest_crc32c: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    #[serde(default)]
    pub name: String,
    #[serde(with = "base64_bytes", default)]
    pub signature: Vec<u8>,
    #[serde(with = "int64_string", default)]
    pub signature_crc32c: Option<i64>,
    #[serde(default)]
    pub verified_digest_crc32c: bool,
    #[serde(default)]
    pub protection_level: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EncryptRequest {
    #[serde(with = "base64_bytes")]
    pub plaintext: Vec<u8>,
    #[serde(with = "int64_string", skip_serializing_if = "Option::is_none")]
    pub plaintext_crc32c: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResponse {
    #[serde(default)]
    pub name: String,
    #[serde(with = "base64_bytes", default)]
    pub ciphertext: Vec<u8>,
    #[serde(with = "int64_string", default)]
    pub ciphertext_crc32c: Option<i64>,
    #[serde(default)]
    pub verified_plaintext_crc32c: bool,
}

/// Body of both `:decrypt` and `:asymmetricDecrypt`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "int64_string", skip_serializing_if = "Option::is_none")]
    pub ciphertext_crc32c: Option<i64>,
}

/// Response of both `:decrypt` and `:asymmetricDecrypt`. Symmetric decrypt
/// never sets `verified_ciphertext_crc32c`; the service rejects a bad tag
/// with an error status instead.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DecryptResponse {
    #[serde(with = "base64_bytes", default)]
    pub plaintext: Vec<u8>,
    #[serde(with = "int64_string", default)]
    pub plaintext_crc32c: Option<i64>,
    #[serde(default)]
    pub verified_ciphertext_crc32c: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub pem: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(with = "int64_string", default)]
    pub pem_crc32c: Option<i64>,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Named {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListKeyRingsResponse {
    #[serde(default)]
    pub key_rings: Vec<Named>,
    #[serde(default)]
    pub next_page_token: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListCryptoKeysResponse {
    #[serde(default)]
    pub crypto_keys: Vec<Named>,
    #[serde(default)]
    pub next_page_token: String,
}

/// Google API error envelope: `{"error": {"code": 400, "message": "..."}}`.
#[derive(Deserialize, Debug, Clone)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

/// Standard-alphabet base64 for `bytes` fields.
pub mod base64_bytes {
    use base64::{prelude::BASE64_STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Proto3 JSON renders int64 wrappers as decimal strings; numbers are
/// accepted too.
pub mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Text(text)) => text.parse().map(Some).map_err(serde::de::Error::custom),
            Some(Raw::Number(n)) => Ok(Some(n)),
            None => Ok(None),
        }
    }
}
