//! Prefix-tagged two-way password encoding
//!
//! Encoded passwords come in three mutually exclusive forms, told apart by
//! their prefix:
//! - strongly encrypted: `"SPEncrypted "` + Base64 RSA ciphertext
//! - legacy obfuscated: `"Encrypted "` + hexadecimal, see [`crate::legacy`]
//! - anything else is plaintext
//!
//! The encoder only ever produces the strong form. Decoding understands all
//! three, delegating legacy values to a [`LegacyDecoder`].

use std::fmt;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, StrongPassError};
use crate::keyfile::{FileKeyProvider, KeyLocations, KeyProvider, KeyRole};
use crate::legacy::{LegacyDecoder, LegacyObfuscator};
use crate::rsacrypt::{AsymmetricCipher, RsaCipher};
use crate::variables;

/// Prefix marking a strongly encrypted password
pub const STRONG_PREFIX: &str = "SPEncrypted ";

/// Minimal encode/decode contract a host integration layer can adapt to its
/// own registration mechanism.
pub trait TwoWayPasswordEncoder {
    /// Encode `raw`. With `include_prefix`, values referencing variables are
    /// returned unchanged and everything else is prefixed; without it the
    /// bare ciphertext is returned.
    fn encode(&self, raw: &str, include_prefix: bool) -> Result<String>;

    /// Decode an optional value.
    ///
    /// With `optionally_encrypted` the prefix decides: strong values are
    /// decrypted (failures propagate), legacy values go to the legacy
    /// decoder, anything else is returned unchanged. Without it the input
    /// must be bare ciphertext.
    fn decode(&self, encoded: Option<&str>, optionally_encrypted: bool) -> Result<Option<String>>;

    /// Best-effort decode of a value that may carry either prefix.
    ///
    /// Strips a strong or legacy prefix and tries strong decryption. If that
    /// fails for any reason, even when the value carried the strong prefix,
    /// the legacy decoder gets the value with only a legacy prefix removed.
    fn decode_lenient(&self, encoded: &str) -> Result<String>;

    /// The recognized prefixes, strong first.
    fn prefixes(&self) -> [&str; 2];

    /// Same as `encode(raw, true)`.
    fn encode_prefixed(&self, raw: &str) -> Result<String> {
        self.encode(raw, true)
    }
}

/// Key material held by a ready encoder. Never changes once loaded.
struct LoadedKeyMaterial {
    public_key: Zeroizing<String>,
    private_key: Zeroizing<String>,
}

enum State {
    Uninitialized,
    Ready(LoadedKeyMaterial),
    /// A key load failed; the encoder never becomes usable.
    Failed,
}

/// RSA backed [`TwoWayPasswordEncoder`] with legacy fallback.
///
/// Starts out uninitialized; [`init`](Self::init) loads both keys once.
/// Every encode/decode call on an uninitialized encoder fails with
/// [`ErrorKind::NotInitialized`], and so does every call after a failed
/// init, which is permanent. A ready encoder only reads its keys, so it
/// can be shared between threads without locking.
pub struct StrongPasswordEncoder {
    locations: KeyLocations,
    cipher: Box<dyn AsymmetricCipher>,
    legacy: Box<dyn LegacyDecoder>,
    state: State,
}

impl StrongPasswordEncoder {
    /// An uninitialized encoder that will read its keys from `locations`.
    pub fn new(locations: KeyLocations) -> Self {
        Self {
            locations,
            cipher: Box::new(RsaCipher::new()),
            legacy: Box::new(LegacyObfuscator::new()),
            state: State::Uninitialized,
        }
    }

    /// Construct and initialize in one step.
    pub fn load(locations: KeyLocations) -> Result<Self> {
        let mut encoder = Self::new(locations);
        encoder.init()?;
        Ok(encoder)
    }

    /// Replace the legacy decoder used for fallback decoding.
    pub fn with_legacy(mut self, legacy: impl LegacyDecoder + 'static) -> Self {
        self.legacy = Box::new(legacy);
        self
    }

    /// Replace the asymmetric cipher.
    pub fn with_cipher(mut self, cipher: impl AsymmetricCipher + 'static) -> Self {
        self.cipher = Box::new(cipher);
        self
    }

    pub fn locations(&self) -> &KeyLocations {
        &self.locations
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Load both keys from the configured key files.
    pub fn init(&mut self) -> Result<()> {
        let provider = FileKeyProvider::new(self.locations.clone());
        self.init_with(&provider)
    }

    /// Load both keys from `provider`.
    ///
    /// On failure the encoder stays unusable for good: later calls fail
    /// without consulting any provider. Once ready, further calls keep the
    /// already loaded keys.
    pub fn init_with(&mut self, provider: &dyn KeyProvider) -> Result<()> {
        match self.state {
            State::Ready(_) => {
                debug!("password encoder already initialized; keeping loaded keys");
                return Ok(());
            }
            State::Failed => {
                return Err(StrongPassError::with_kind(
                    ErrorCategory::Internal,
                    ErrorKind::KeyLoadFailure,
                    "password encoder failed to load its keys earlier; create a new encoder",
                ));
            }
            State::Uninitialized => {}
        }

        let loaded = provider.load_key(KeyRole::Public).and_then(|public_key| {
            let private_key = provider.load_key(KeyRole::Private)?;
            Ok(LoadedKeyMaterial {
                public_key,
                private_key,
            })
        });
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                self.state = State::Failed;
                return Err(e.with_context("cannot initialize password encoder"));
            }
        };

        self.state = State::Ready(loaded);
        info!(
            public_key = %self.locations.public.path().display(),
            private_key = %self.locations.private.path().display(),
            "password encoder ready"
        );
        Ok(())
    }

    fn keys(&self) -> Result<&LoadedKeyMaterial> {
        match &self.state {
            State::Ready(keys) => Ok(keys),
            State::Uninitialized | State::Failed => Err(StrongPassError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::NotInitialized,
                "password encoder used before its keys were loaded",
            )),
        }
    }

    fn encrypt(&self, password: &str) -> Result<String> {
        let keys = self.keys()?;
        self.cipher.encrypt(password, &keys.public_key)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let keys = self.keys()?;
        self.cipher.decrypt(ciphertext, &keys.private_key)
    }
}

impl fmt::Debug for StrongPasswordEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongPasswordEncoder")
            .field("locations", &self.locations)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl TwoWayPasswordEncoder for StrongPasswordEncoder {
    fn encode(&self, raw: &str, include_prefix: bool) -> Result<String> {
        if !include_prefix {
            return self.encrypt(raw);
        }

        // Fail on misuse even when the value would be passed through.
        self.keys()?;
        if variables::contains_unresolved_variables(raw) {
            debug!("password references variables; leaving it unencrypted");
            return Ok(raw.to_string());
        }
        Ok(format!("{}{}", STRONG_PREFIX, self.encrypt(raw)?))
    }

    fn decode(&self, encoded: Option<&str>, optionally_encrypted: bool) -> Result<Option<String>> {
        self.keys()?;
        let Some(encoded) = encoded else {
            return Ok(None);
        };

        if !optionally_encrypted {
            return self.decrypt(encoded).map(Some);
        }

        if let Some(ciphertext) = encoded.strip_prefix(STRONG_PREFIX) {
            self.decrypt(ciphertext).map(Some)
        } else if encoded.starts_with(self.legacy.prefix()) {
            debug!("delegating legacy obfuscated password to legacy decoder");
            self.legacy.decrypt_optionally_encrypted(encoded).map(Some)
        } else {
            Ok(Some(encoded.to_string()))
        }
    }

    fn decode_lenient(&self, encoded: &str) -> Result<String> {
        self.keys()?;

        // The legacy decoder sees the input with a legacy prefix removed,
        // but a strong prefix left in place.
        let (ciphertext, fallback) = if let Some(rest) = encoded.strip_prefix(STRONG_PREFIX) {
            (rest, encoded)
        } else if let Some(rest) = encoded.strip_prefix(self.legacy.prefix()) {
            (rest, rest)
        } else {
            (encoded, encoded)
        };

        match self.decrypt(ciphertext) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                // Compatibility behavior: even a strong-prefixed value falls
                // back to the legacy scheme instead of failing here.
                warn!(
                    strong_prefix = encoded.starts_with(STRONG_PREFIX),
                    error = %e,
                    "strong decryption failed; falling back to legacy decoding"
                );
                self.legacy.decrypt_unconditional(fallback)
            }
        }
    }

    fn prefixes(&self) -> [&str; 2] {
        [STRONG_PREFIX, self.legacy.prefix()]
    }
}
