//! Structured errors for facade and backend operations.
//!
//! Every failure carries the [`Operation`] and the resource name it was
//! issued against, so the caller decides how to render or log it.

use thiserror::Error;

use crate::backend::Operation;

/// Result type for KMS operations.
pub type KmsResult<T> = Result<T, KmsError>;

/// An operation-level failure. `kind` is rendered inline, not chained as
/// the error source.
#[derive(Debug, Error)]
#[error("{operation} on {resource}: {kind}")]
pub struct KmsError {
    pub operation: Operation,
    pub resource: String,
    pub kind: ErrorKind,
}

/// What went wrong.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The request never completed (connection, TLS, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service returned {code}: {message}")]
    Status { code: u16, message: String },

    /// The service response could not be decoded.
    #[error("malformed service response: {0}")]
    Decode(String),

    /// A CRC32C tag did not match; the channel may have corrupted data.
    #[error("integrity violation: {0}")]
    Integrity(IntegrityViolation),

    /// Public key could not be parsed or belongs to the wrong algorithm family.
    #[error("key material error: {0}")]
    KeyMaterial(String),

    /// Caller input the local primitive cannot process, e.g. a plaintext
    /// longer than the key's RSA-OAEP limit.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The signature does not validate against the message and key.
    #[error("signature verification failed")]
    VerificationFailed,

    /// Input does not carry the mock backend's expected tag.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidPlaintext,

    /// The caller cancelled the call.
    #[error("operation cancelled")]
    Cancelled,

    /// The call ran past its deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Which integrity check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
    /// The service did not confirm the checksum we sent.
    #[error("request corrupted in-transit")]
    RequestNotVerified,

    /// The checksum of the returned bytes differs from the one the service claims.
    #[error("response corrupted in-transit")]
    ResponseChecksumMismatch,

    /// The service answered for a different resource than we addressed.
    #[error("response names a different key version")]
    ResponseNameMismatch,

    /// The service omitted the checksum of the returned bytes.
    #[error("response checksum missing")]
    MissingChecksum,
}

impl KmsError {
    pub fn new(operation: Operation, resource: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            operation,
            resource: resource.into(),
            kind,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Transport-class failure: the remote call did not yield a usable answer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Transport(_) | ErrorKind::Status { .. } | ErrorKind::Decode(_)
        )
    }

    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self.kind, ErrorKind::Integrity(_))
    }

    #[must_use]
    pub fn is_verification_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::VerificationFailed)
    }

    /// Cancelled by the caller or by a deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled | ErrorKind::DeadlineExceeded)
    }
}

impl From<reqwest::Error> for ErrorKind {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ErrorKind::DeadlineExceeded
        } else if err.is_decode() {
            ErrorKind::Decode(err.to_string())
        } else {
            ErrorKind::Transport(err.to_string())
        }
    }
}
