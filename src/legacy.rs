//! Legacy two-way password obfuscation
//!
//! Secrets stored before the RSA scheme existed are obfuscated, not
//! encrypted: the UTF-8 bytes of the password are read as a big-endian
//! two's complement integer, XORed with a fixed decimal seed and rendered
//! in lowercase hexadecimal. Stored values carry the `"Encrypted "` prefix.
//!
//! This module only exists so such values keep decoding. It offers no
//! confidentiality whatsoever.

use std::env;

use num_bigint::{BigInt, Sign};
use tracing::debug;

use crate::error::{ErrorCategory, ErrorKind, Result, StrongPassError};

/// Prefix marking a legacy obfuscated value
pub const LEGACY_PREFIX: &str = "Encrypted ";

/// Seed used unless overridden
pub const DEFAULT_SEED: &str = "0933910847463829827159347601486730416058";

/// [`DEFAULT_SEED`] as big-endian magnitude bytes
const DEFAULT_SEED_BYTES: [u8; 17] = [
    0x02, 0xbe, 0x98, 0xaf, 0xc8, 0x6a, 0xa7, 0xf2, 0xe4, 0xcb, 0x79, 0xce, 0x10, 0xbe, 0xf2, 0xcf,
    0xba,
];

/// Environment variable consulted by [`LegacyObfuscator::from_env`]
pub const SEED_ENV_VAR: &str = "KETTLE_TWO_WAY_PASSWORD_ENCODER_SEED";

const RADIX: u32 = 16;

/// Decoder for the legacy scheme, as consumed by the strong encoder's
/// fallback paths.
pub trait LegacyDecoder: Send + Sync {
    /// The prefix legacy values carry.
    fn prefix(&self) -> &str;

    /// Decode a bare obfuscated value (no prefix).
    fn decrypt_unconditional(&self, text: &str) -> Result<String>;

    /// Decode `text` if it carries the legacy prefix, otherwise return it
    /// unchanged.
    fn decrypt_optionally_encrypted(&self, text: &str) -> Result<String> {
        match text.strip_prefix(self.prefix()) {
            Some(obfuscated) => self.decrypt_unconditional(obfuscated),
            None => Ok(text.to_string()),
        }
    }
}

/// XOR-with-seed obfuscator compatible with previously stored values.
#[derive(Debug, Clone)]
pub struct LegacyObfuscator {
    seed: BigInt,
}

impl LegacyObfuscator {
    pub fn new() -> Self {
        Self {
            seed: BigInt::from_bytes_be(Sign::Plus, &DEFAULT_SEED_BYTES),
        }
    }

    /// Build an obfuscator around a custom decimal seed.
    pub fn with_seed(seed: &str) -> Result<Self> {
        let seed = BigInt::parse_bytes(seed.trim().as_bytes(), 10).ok_or_else(|| {
            StrongPassError::with_kind(
                ErrorCategory::User,
                ErrorKind::LegacyDecodeFailure,
                format!("legacy seed {:?} is not a decimal integer", seed),
            )
        })?;
        Ok(Self { seed })
    }

    /// Use the seed from `KETTLE_TWO_WAY_PASSWORD_ENCODER_SEED` when set,
    /// the default seed otherwise.
    pub fn from_env() -> Result<Self> {
        match env::var(SEED_ENV_VAR) {
            Ok(seed) if !seed.trim().is_empty() => {
                debug!(env = SEED_ENV_VAR, "using legacy seed from environment");
                Self::with_seed(&seed)
            }
            _ => Ok(Self::new()),
        }
    }

    /// Obfuscate a password (without adding the prefix).
    pub fn obfuscate(&self, password: &str) -> String {
        if password.is_empty() {
            return String::new();
        }
        let value = BigInt::from_signed_bytes_be(password.as_bytes());
        (value ^ &self.seed).to_str_radix(RADIX)
    }

    /// Obfuscate a password and prepend [`LEGACY_PREFIX`].
    pub fn obfuscate_prefixed(&self, password: &str) -> String {
        format!("{}{}", LEGACY_PREFIX, self.obfuscate(password))
    }
}

impl Default for LegacyObfuscator {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyDecoder for LegacyObfuscator {
    fn prefix(&self) -> &str {
        LEGACY_PREFIX
    }

    fn decrypt_unconditional(&self, text: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        // parse_bytes tolerates `_` separators, which are not hex digits.
        let value = Some(text)
            .filter(|t| !t.contains('_'))
            .and_then(|t| BigInt::parse_bytes(t.as_bytes(), RADIX))
            .ok_or_else(|| {
                StrongPassError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::LegacyDecodeFailure,
                    "value is not legacy obfuscated (expected hexadecimal digits)",
                )
            })?;
        let bytes = (value ^ &self.seed).to_signed_bytes_be();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
