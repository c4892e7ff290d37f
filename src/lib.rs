//! Strongpass - RSA based two-way password encoding
//!
//! Turns plaintext secrets into prefix-tagged RSA ciphertext and back,
//! while still decoding values produced by the older XOR obfuscation
//! scheme.

#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod keyfile;
pub mod keypair;
pub mod legacy;
pub mod rsacrypt;
pub mod secret;
pub mod variables;

pub use codec::{STRONG_PREFIX, StrongPasswordEncoder, TwoWayPasswordEncoder};
pub use error::{ErrorCategory, ErrorKind, Result, StrongPassError};
pub use keyfile::{KeyLocation, KeyLocations, KeyRole};
pub use keypair::KeyPairArtifact;
pub use legacy::{LEGACY_PREFIX, LegacyDecoder, LegacyObfuscator};
pub use rsacrypt::{AsymmetricCipher, RsaCipher};
