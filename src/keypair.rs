//! Base64 encoded RSA key pair as produced by key generation
//!
//! The public key is the Base64 encoding of its X.509 SubjectPublicKeyInfo
//! DER form, the private key the Base64 encoding of its PKCS#8 DER form.
//! These are exactly the strings persisted to the key files.

use std::fmt;

use zeroize::Zeroizing;

/// Immutable holder for a freshly generated key pair.
///
/// The private half is wiped from memory when the pair is dropped. `Debug`
/// never prints key material; use [`KeyPairArtifact::export_listing`] when
/// the keys must be shown to an operator.
pub struct KeyPairArtifact {
    public_key: String,
    private_key: Zeroizing<String>,
}

impl KeyPairArtifact {
    pub fn new(public_key: String, private_key: String) -> Self {
        Self {
            public_key,
            private_key: Zeroizing::new(private_key),
        }
    }

    /// The Base64 encoded X.509 public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// The Base64 encoded PKCS#8 private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Textual dump of both keys, intended strictly for key-provisioning
    /// tooling. Never route this through runtime logging.
    pub fn export_listing(&self) -> Zeroizing<String> {
        Zeroizing::new(format!(
            "Public key:{}\nPrivate key:{}",
            self.public_key,
            self.private_key.as_str()
        ))
    }
}

impl fmt::Debug for KeyPairArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairArtifact")
            .field("public_key_len", &self.public_key.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}
