//! Encryption/decryption using RSA with PKCS#1 v1.5 padding
//!
//! Keys travel as Base64 strings:
//! - public keys: X.509 SubjectPublicKeyInfo, DER encoded
//! - private keys: PKCS#8, DER encoded
//!
//! A single call encrypts a single block, so the plaintext may be at most
//! `modulus_bytes - 11` bytes long (245 bytes for a 2048-bit key). Longer
//! input is rejected, never truncated or chunked.
//!
//! Every call parses its own key and uses its own RNG handle, so a cipher
//! value can be shared freely between threads.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, StrongPassError};
use crate::keypair::KeyPairArtifact;

/// Modulus size of generated keys, in bits
pub const KEY_SIZE_BITS: usize = 2048;

/// Bytes consumed by PKCS#1 v1.5 encryption padding
pub const PKCS1_PADDING_OVERHEAD: usize = 11;

/// Asymmetric encrypt/decrypt primitive without any protocol knowledge.
pub trait AsymmetricCipher: Send + Sync {
    /// Encrypt raw bytes under a Base64 encoded public key.
    fn encrypt_bytes(&self, plaintext: &[u8], public_key: &str) -> Result<Vec<u8>>;

    /// Decrypt raw ciphertext with a Base64 encoded private key.
    fn decrypt_bytes(&self, ciphertext: &[u8], private_key: &str) -> Result<Vec<u8>>;

    /// Generate a fresh key pair from a cryptographically secure source.
    fn generate_key_pair(&self) -> Result<KeyPairArtifact>;

    /// UTF-8 encode, encrypt, and Base64 encode the result.
    fn encrypt(&self, text: &str, public_key: &str) -> Result<String> {
        let ciphertext = self.encrypt_bytes(text.as_bytes(), public_key)?;
        Ok(BASE64_STANDARD.encode(ciphertext))
    }

    /// Base64 decode, decrypt, and UTF-8 decode the result.
    fn decrypt(&self, base64_ciphertext: &str, private_key: &str) -> Result<String> {
        let ciphertext = BASE64_STANDARD.decode(base64_ciphertext).map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::DecryptionFailure,
                format!("ciphertext is not valid base64: {}", e),
                e,
            )
        })?;
        let plaintext = Zeroizing::new(self.decrypt_bytes(&ciphertext, private_key)?);
        String::from_utf8(plaintext.to_vec()).map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::DecryptionFailure,
                "decrypted data is not valid UTF-8",
                e,
            )
        })
    }
}

/// RSA implementation of [`AsymmetricCipher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaCipher;

impl RsaCipher {
    pub fn new() -> Self {
        Self
    }
}

impl AsymmetricCipher for RsaCipher {
    fn encrypt_bytes(&self, plaintext: &[u8], public_key: &str) -> Result<Vec<u8>> {
        let key = parse_public_key(public_key)?;

        let max_len = key.size().saturating_sub(PKCS1_PADDING_OVERHEAD);
        if plaintext.len() > max_len {
            return Err(StrongPassError::with_kind(
                ErrorCategory::User,
                ErrorKind::EncryptionFailure,
                format!(
                    "plaintext of {} bytes exceeds the {} byte limit of a {}-bit key",
                    plaintext.len(),
                    max_len,
                    key.size() * 8
                ),
            ));
        }

        key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| {
                StrongPassError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::EncryptionFailure,
                    format!("encryption failed: {}", e),
                    e,
                )
            })
    }

    fn decrypt_bytes(&self, ciphertext: &[u8], private_key: &str) -> Result<Vec<u8>> {
        let key = parse_private_key(private_key)?;

        key.decrypt(Pkcs1v15Encrypt, ciphertext).map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::DecryptionFailure,
                "corrupt ciphertext, wrong private key, or padding mismatch",
                e,
            )
        })
    }

    fn generate_key_pair(&self) -> Result<KeyPairArtifact> {
        let private_key = RsaPrivateKey::new(&mut OsRng, KEY_SIZE_BITS).map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::KeyGenerationFailure,
                format!("failed to generate {}-bit RSA key: {}", KEY_SIZE_BITS, e),
                e,
            )
        })?;
        let public_key = RsaPublicKey::from(&private_key);

        let public_der = public_key.to_public_key_der().map_err(|e| {
            StrongPassError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::KeyGenerationFailure,
                format!("failed to encode public key: {}", e),
            )
        })?;
        let private_der = private_key.to_pkcs8_der().map_err(|e| {
            StrongPassError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::KeyGenerationFailure,
                format!("failed to encode private key: {}", e),
            )
        })?;

        Ok(KeyPairArtifact::new(
            BASE64_STANDARD.encode(public_der.as_bytes()),
            BASE64_STANDARD.encode(private_der.as_bytes()),
        ))
    }
}

/// Decode a public key from its Base64/X.509 form
fn parse_public_key(base64_key: &str) -> Result<RsaPublicKey> {
    let der = BASE64_STANDARD.decode(base64_key).map_err(|e| {
        StrongPassError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::EncryptionFailure,
            format!("public key is not valid base64: {}", e),
            e,
        )
    })?;
    RsaPublicKey::from_public_key_der(&der).map_err(|e| {
        StrongPassError::with_kind(
            ErrorCategory::User,
            ErrorKind::EncryptionFailure,
            format!("cannot parse public key: {}", e),
        )
    })
}

/// Decode a private key from its Base64/PKCS#8 form
fn parse_private_key(base64_key: &str) -> Result<RsaPrivateKey> {
    let der = Zeroizing::new(BASE64_STANDARD.decode(base64_key).map_err(|e| {
        StrongPassError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::DecryptionFailure,
            format!("private key is not valid base64: {}", e),
            e,
        )
    })?);
    RsaPrivateKey::from_pkcs8_der(&der).map_err(|e| {
        StrongPassError::with_kind(
            ErrorCategory::User,
            ErrorKind::DecryptionFailure,
            format!("cannot parse private key: {}", e),
        )
    })
}
