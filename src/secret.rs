//! Reading the secret to encode

use crate::error::{ErrorCategory, ErrorKind, Result, StrongPassError};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading secrets from various sources
pub trait SecretReader {
    /// Read a secret as UTF-8 text.
    ///
    /// Returns the secret wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_secret(&mut self) -> Result<Zeroizing<String>>;
}

/// Returns a fixed secret (for testing)
pub struct ConstantSecretReader {
    secret: Zeroizing<String>,
}

impl ConstantSecretReader {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }
}

impl SecretReader for ConstantSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<String>> {
        Ok(self.secret.clone())
    }
}

/// Reads a secret from any io::Read source
///
/// A single trailing line ending is stripped, so `echo secret | strongpass
/// encode --secret-stdin` encodes `secret`.
pub struct ReaderSecretReader {
    reader: Box<dyn Read>,
}

impl ReaderSecretReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl SecretReader for ReaderSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<String>> {
        let mut data = Zeroizing::new(String::new());
        self.reader.read_to_string(&mut data).map_err(|e| {
            let category = if e.kind() == io::ErrorKind::InvalidData {
                ErrorCategory::User
            } else {
                ErrorCategory::Internal
            };
            StrongPassError::with_kind_and_source(
                category,
                ErrorKind::Io,
                format!("error reading secret: {}", e),
                e,
            )
        })?;
        if data.ends_with('\n') {
            data.pop();
            if data.ends_with('\r') {
                data.pop();
            }
        }
        Ok(data)
    }
}

/// Reads a secret from the terminal with no echo
pub struct TerminalSecretReader;

impl TerminalSecretReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalSecretReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretReader for TerminalSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(StrongPassError::with_kind(
                ErrorCategory::User,
                ErrorKind::Io,
                "cannot read secret from terminal - stdin is not a terminal",
            ));
        }

        io::stderr().write_all(b"Password to encode: ").map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // Note: rpassword returns a plain String, zeroized from here on
        let secret = rpassword::read_password().map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failure reading secret: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(secret))
    }
}
