//! Cloud KMS cryptographic operations behind one facade.
//!
//! [`KmsFacade`] exposes list, symmetric encrypt/decrypt, asymmetric
//! encrypt/decrypt, sign and verify over a swappable [`CryptoBackend`]:
//! [`RemoteBackend`] talks to the Cloud KMS REST API with CRC32C integrity
//! checks on every payload, [`MockBackend`] is a deterministic in-memory stand-in.

pub mod backend;
pub mod checksum;
pub mod common;
pub mod config;
pub mod error;
pub mod facade;
pub mod iam;
pub mod keys;
pub mod mock;
pub mod remote;
pub mod telemetry;

pub use backend::{CryptoBackend, Operation};
pub use common::KeyRef;
pub use error::{ErrorKind, IntegrityViolation, KmsError, KmsResult};
pub use facade::KmsFacade;
pub use mock::MockBackend;
pub use remote::RemoteBackend;
pub use tokio_util::sync::CancellationToken;
