//! Public key material returned by Cloud KMS and the local halves of the
//! asymmetric operations: RSA-OAEP encryption, RSA-PSS and ECDSA verification.
//!
//! Digest is always SHA-256. PSS salt length equals the digest length.

use digest::Digest as _;
use ecdsa::signature::hazmat::PrehashVerifier;
use rand::rngs::OsRng;
use rsa::{Oaep, Pss, RsaPublicKey};
use sha2::Sha256;
use spki::{DecodePublicKey, ObjectIdentifier, SubjectPublicKeyInfoRef};

use crate::error::ErrorKind;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP256K1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

const SHA256_LEN: usize = 32;

pub fn sha256(message: &[u8]) -> [u8; SHA256_LEN] {
    Sha256::digest(message).into()
}

/// A parsed `PUBLIC KEY` PEM block.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    P256(p256::ecdsa::VerifyingKey),
    Secp256k1(k256::ecdsa::VerifyingKey),
}

impl PublicKey {
    pub fn from_pem(pem: &str) -> Result<Self, ErrorKind> {
        let block = pem::parse(pem).map_err(|e| key_error(format!("invalid PEM: {e}")))?;
        let der = block.contents();
        let info = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| key_error(format!("invalid SubjectPublicKeyInfo: {e}")))?;

        let algorithm = info.algorithm.oid;
        if algorithm == RSA_ENCRYPTION {
            return RsaPublicKey::from_public_key_der(der)
                .map(PublicKey::Rsa)
                .map_err(|e| key_error(format!("invalid RSA key: {e}")));
        }
        if algorithm != EC_PUBLIC_KEY {
            return Err(key_error(format!("unsupported key algorithm {algorithm}")));
        }

        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|e| key_error(format!("missing EC curve: {e}")))?;
        if curve == SECP256R1 {
            p256::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(PublicKey::P256)
                .map_err(|e| key_error(format!("invalid P-256 key: {e}")))
        } else if curve == SECP256K1 {
            k256::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(PublicKey::Secp256k1)
                .map_err(|e| key_error(format!("invalid secp256k1 key: {e}")))
        } else {
            Err(key_error(format!("unsupported curve {curve}")))
        }
    }

    fn rsa(&self) -> Result<&RsaPublicKey, ErrorKind> {
        match self {
            PublicKey::Rsa(key) => Ok(key),
            _ => Err(key_error("public key is not rsa")),
        }
    }

    /// RSA-OAEP with SHA-256 and an empty label. A plaintext over the key's
    /// OAEP limit is [`ErrorKind::InvalidInput`].
    pub fn encrypt_oaep(&self, plaintext: &[u8]) -> Result<Vec<u8>, ErrorKind> {
        self.rsa()?
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| match e {
                rsa::Error::MessageTooLong => ErrorKind::InvalidInput(format!(
                    "plaintext of {} bytes exceeds the rsa oaep limit",
                    plaintext.len()
                )),
                e => key_error(format!("rsa oaep encryption: {e}")),
            })
    }

    pub fn verify_pss(&self, message: &[u8], signature: &[u8]) -> Result<(), ErrorKind> {
        let key = self.rsa()?;
        let digest = sha256(message);
        key.verify(Pss::new_with_salt::<Sha256>(SHA256_LEN), &digest, signature)
            .map_err(|_| ErrorKind::VerificationFailed)
    }

    /// ECDSA over the SHA-256 digest of `message`. `signature` is the ASN.1
    /// DER `SEQUENCE { r, s }` Cloud KMS returns.
    pub fn verify_ecdsa(&self, message: &[u8], signature: &[u8]) -> Result<(), ErrorKind> {
        let digest = sha256(message);
        match self {
            PublicKey::P256(key) => {
                let (r, s) = parse_der_signature(signature)?;
                let sig = p256::ecdsa::Signature::from_scalars(r, s)
                    .map_err(|_| ErrorKind::VerificationFailed)?;
                key.verify_prehash(&digest, &sig)
                    .map_err(|_| ErrorKind::VerificationFailed)
            }
            PublicKey::Secp256k1(key) => {
                let (r, s) = parse_der_signature(signature)?;
                let sig = k256::ecdsa::Signature::from_scalars(r, s)
                    .map_err(|_| ErrorKind::VerificationFailed)?;
                // secp256k1 verification only accepts low-S
                let sig = sig.normalize_s().unwrap_or(sig);
                key.verify_prehash(&digest, &sig)
                    .map_err(|_| ErrorKind::VerificationFailed)
            }
            PublicKey::Rsa(_) => Err(key_error("public key is not elliptic curve")),
        }
    }
}

fn key_error(message: impl Into<String>) -> ErrorKind {
    ErrorKind::KeyMaterial(message.into())
}

fn parse_der_signature(signature: &[u8]) -> Result<([u8; 32], [u8; 32]), ErrorKind> {
    let sig: asn1::ParseResult<_> = asn1::parse(signature, |d| {
        return d.read_element::<asn1::Sequence>()?.parse(|d| {
            let r = d.read_element::<asn1::BigUint>()?.as_bytes().to_vec();
            let s = d.read_element::<asn1::BigUint>()?.as_bytes().to_vec();
            Ok((r, s))
        });
    });
    let (r, s) = sig.map_err(|_| ErrorKind::VerificationFailed)?;

    match (fixed_scalar(&r), fixed_scalar(&s)) {
        (Some(r), Some(s)) => Ok((r, s)),
        _ => Err(ErrorKind::VerificationFailed),
    }
}

/// DER integers carry a leading zero when the top bit is set and drop
/// leading zero bytes otherwise; scalars are fixed 32-byte big-endian.
fn fixed_scalar(bytes: &[u8]) -> Option<[u8; 32]> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let trimmed = &bytes[first..];
    if trimmed.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecdsa::signature::hazmat::PrehashSigner;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn rsa_pair() -> (RsaPrivateKey, String) {
        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (private, pem)
    }

    #[test]
    fn oaep_round_trip() {
        let (private, pem) = rsa_pair();
        let key = PublicKey::from_pem(&pem).unwrap();
        let ciphertext = key.encrypt_oaep(b"top secret").unwrap();
        let plaintext = private.decrypt(Oaep::new::<Sha256>(), &ciphertext).unwrap();
        assert_eq!(plaintext, b"top secret");
    }

    #[test]
    fn oversize_oaep_plaintext_is_invalid_input() {
        let (_, pem) = rsa_pair();
        let key = PublicKey::from_pem(&pem).unwrap();
        // 1024-bit modulus: 128 - 2 * 32 - 2 = 62 bytes at most
        assert!(key.encrypt_oaep(&[0u8; 62]).is_ok());
        let err = key.encrypt_oaep(&[0u8; 63]).unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidInput(_)));
    }

    #[test]
    fn pss_verify() {
        let (private, pem) = rsa_pair();
        let key = PublicKey::from_pem(&pem).unwrap();
        let digest = sha256(b"message");
        let signature = private
            .sign_with_rng(&mut OsRng, Pss::new_with_salt::<Sha256>(32), &digest)
            .unwrap();

        key.verify_pss(b"message", &signature).unwrap();
        assert!(matches!(
            key.verify_pss(b"other message", &signature),
            Err(ErrorKind::VerificationFailed)
        ));
    }

    #[test]
    fn p256_verify() {
        let signing = p256::ecdsa::SigningKey::random(&mut OsRng);
        let pem = signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let key = PublicKey::from_pem(&pem).unwrap();
        assert!(matches!(key, PublicKey::P256(_)));

        let sig: p256::ecdsa::Signature = signing.sign_prehash(&sha256(b"msg")).unwrap();
        let der = sig.to_der();
        key.verify_ecdsa(b"msg", der.as_bytes()).unwrap();
        assert!(matches!(
            key.verify_ecdsa(b"msh", der.as_bytes()),
            Err(ErrorKind::VerificationFailed)
        ));
    }

    #[test]
    fn secp256k1_verify() {
        let signing = k256::ecdsa::SigningKey::random(&mut OsRng);
        let pem = signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let key = PublicKey::from_pem(&pem).unwrap();
        assert!(matches!(key, PublicKey::Secp256k1(_)));

        let sig: k256::ecdsa::Signature = signing.sign_prehash(&sha256(b"msg")).unwrap();
        key.verify_ecdsa(b"msg", sig.to_der().as_bytes()).unwrap();
    }

    #[test]
    fn wrong_family_is_key_material_error() {
        let (_, pem) = rsa_pair();
        let key = PublicKey::from_pem(&pem).unwrap();
        assert!(matches!(
            key.verify_ecdsa(b"msg", b"sig"),
            Err(ErrorKind::KeyMaterial(_))
        ));

        let signing = p256::ecdsa::SigningKey::random(&mut OsRng);
        let pem = signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let key = PublicKey::from_pem(&pem).unwrap();
        assert!(matches!(key.encrypt_oaep(b"x"), Err(ErrorKind::KeyMaterial(_))));
        assert!(matches!(key.verify_pss(b"x", b"y"), Err(ErrorKind::KeyMaterial(_))));
    }

    #[test]
    fn garbage_pem_is_key_material_error() {
        assert!(matches!(
            PublicKey::from_pem("not a pem"),
            Err(ErrorKind::KeyMaterial(_))
        ));
    }

    #[test]
    fn malformed_signature_fails_verification() {
        let signing = p256::ecdsa::SigningKey::random(&mut OsRng);
        let key = PublicKey::P256(signing.verifying_key().clone());
        assert!(matches!(
            key.verify_ecdsa(b"msg", b"\x30\x02\x01"),
            Err(ErrorKind::VerificationFailed)
        ));
    }

    #[test]
    fn scalar_padding() {
        assert_eq!(fixed_scalar(&[0, 0x80]).unwrap()[31], 0x80);
        let mut long = vec![0u8];
        long.extend_from_slice(&[0xff; 32]);
        assert_eq!(fixed_scalar(&long), Some([0xff; 32]));
        assert_eq!(fixed_scalar(&[1u8; 33]), None);
    }
}
