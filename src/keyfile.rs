//! Key file locations, loading and persistence
//!
//! Each key lives in its own flat text file holding exactly the Base64
//! encoded key material, with no framing, metadata or checksum.

use std::env;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, StrongPassError};
use crate::keypair::KeyPairArtifact;

pub const DEFAULT_PUBLIC_KEY_FILE: &str = "public.key";
pub const DEFAULT_PRIVATE_KEY_FILE: &str = "private.key";
pub const DEFAULT_KEY_DIR: &str = ".";

pub const PUBLIC_KEY_FILENAME_ENV: &str = "KETTLE_STRONG_PASSWORD_ENCODED_PUBKEY_FILENAME";
pub const PRIVATE_KEY_FILENAME_ENV: &str = "KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_FILENAME";
pub const PUBLIC_KEY_PATH_ENV: &str = "KETTLE_STRONG_PASSWORD_ENCODED_PUBKEY_PATH";
pub const PRIVATE_KEY_PATH_ENV: &str = "KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_PATH";

/// Logical designation of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Public,
    Private,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Public => f.write_str("public"),
            KeyRole::Private => f.write_str("private"),
        }
    }
}

/// Directory plus file name of one key file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocation {
    pub directory: PathBuf,
    pub file_name: String,
}

impl KeyLocation {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Where both keys of a pair are stored.
///
/// Defaults to `./public.key` and `./private.key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocations {
    pub public: KeyLocation,
    pub private: KeyLocation,
}

impl Default for KeyLocations {
    fn default() -> Self {
        Self {
            public: KeyLocation::new(DEFAULT_KEY_DIR, DEFAULT_PUBLIC_KEY_FILE),
            private: KeyLocation::new(DEFAULT_KEY_DIR, DEFAULT_PRIVATE_KEY_FILE),
        }
    }
}

impl KeyLocations {
    /// Both key files inside `directory`, using the default file names.
    pub fn in_dir(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();
        Self {
            public: KeyLocation::new(directory, DEFAULT_PUBLIC_KEY_FILE),
            private: KeyLocation::new(directory, DEFAULT_PRIVATE_KEY_FILE),
        }
    }

    /// Defaults, overridden by any of the `KETTLE_STRONG_PASSWORD_ENCODED_*`
    /// environment variables that are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults, overridden by whatever `lookup` returns for the
    /// `KETTLE_STRONG_PASSWORD_ENCODED_*` names. Empty values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let mut locations = Self::default();
        if let Some(dir) = get(PUBLIC_KEY_PATH_ENV) {
            locations.public.directory = PathBuf::from(dir);
        }
        if let Some(name) = get(PUBLIC_KEY_FILENAME_ENV) {
            locations.public.file_name = name;
        }
        if let Some(dir) = get(PRIVATE_KEY_PATH_ENV) {
            locations.private.directory = PathBuf::from(dir);
        }
        if let Some(name) = get(PRIVATE_KEY_FILENAME_ENV) {
            locations.private.file_name = name;
        }
        locations
    }

    pub fn location(&self, role: KeyRole) -> &KeyLocation {
        match role {
            KeyRole::Public => &self.public,
            KeyRole::Private => &self.private,
        }
    }
}

/// Source of Base64 encoded key material
pub trait KeyProvider {
    fn load_key(&self, role: KeyRole) -> Result<Zeroizing<String>>;
}

/// Reads keys from the files named by a [`KeyLocations`].
#[derive(Debug, Clone, Default)]
pub struct FileKeyProvider {
    locations: KeyLocations,
}

impl FileKeyProvider {
    pub fn new(locations: KeyLocations) -> Self {
        Self { locations }
    }
}

impl KeyProvider for FileKeyProvider {
    fn load_key(&self, role: KeyRole) -> Result<Zeroizing<String>> {
        let path = self.locations.location(role).path();
        let bytes = Zeroizing::new(fs::read(&path).map_err(|e| {
            let category = if e.kind() == io::ErrorKind::NotFound {
                ErrorCategory::User
            } else {
                ErrorCategory::Internal
            };
            StrongPassError::with_kind_and_source(
                category,
                ErrorKind::KeyLoadFailure,
                format!("cannot load {} key from {}", role, path.display()),
                e,
            )
        })?);
        let content = std::str::from_utf8(&bytes).map_err(|e| {
            StrongPassError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::KeyLoadFailure,
                format!("{} key file {} is not valid UTF-8", role, path.display()),
                e,
            )
        })?;
        let key = content.trim();
        if key.is_empty() {
            return Err(StrongPassError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyLoadFailure,
                format!("{} key file {} is empty", role, path.display()),
            ));
        }
        debug!(role = %role, path = %path.display(), "loaded key file");
        Ok(Zeroizing::new(key.to_string()))
    }
}

/// Persist both halves of `pair` to the configured locations.
///
/// Files are created with mode 0o600 on Unix systems. Without `overwrite`,
/// an existing target fails the call before anything is written. With
/// `overwrite`, each file is replaced atomically (tempfile + fsync + rename)
/// so a crash never leaves a partially written key behind.
pub fn write_key_pair(
    pair: &KeyPairArtifact,
    locations: &KeyLocations,
    overwrite: bool,
) -> Result<()> {
    let public_path = locations.public.path();
    let private_path = locations.private.path();

    if public_path == private_path {
        return Err(StrongPassError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!(
                "public and private key would both be written to {}",
                public_path.display()
            ),
        ));
    }

    if !overwrite {
        for path in [&public_path, &private_path] {
            if path.exists() {
                return Err(StrongPassError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!(
                        "refusing to overwrite existing key file {}",
                        path.display()
                    ),
                ));
            }
        }
        write_file_secure(&public_path, pair.public_key().as_bytes())?;
        write_file_secure(&private_path, pair.private_key().as_bytes())?;
    } else {
        replace_file_atomic(&public_path, pair.public_key().as_bytes())?;
        replace_file_atomic(&private_path, pair.private_key().as_bytes())?;
    }

    debug!(
        public = %public_path.display(),
        private = %private_path.display(),
        "wrote key pair"
    );
    Ok(())
}

/// Create a new file with secure permissions (0o600 on Unix), failing if it exists
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        StrongPassError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create {}", path.display()),
            e,
        )
    })?;

    file.write_all(contents).map_err(|e| {
        StrongPassError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to write {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Replace `path` atomically with `contents` (0o600 on Unix)
fn replace_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new(DEFAULT_KEY_DIR),
    };
    let io_error = |msg: String, e: io::Error| {
        StrongPassError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, e)
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| io_error(format!("failed to create tempfile in {}", dir.display()), e))?;
    temp_file
        .write_all(contents)
        .map_err(|e| io_error("failed to write to tempfile".to_string(), e))?;
    temp_file
        .flush()
        .map_err(|e| io_error("failed to flush tempfile".to_string(), e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| io_error("failed to sync file prior to rename".to_string(), e))?;

    // NamedTempFile already creates files as 0o600 on Unix; make it explicit.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| io_error("failed to set tempfile permissions".to_string(), e))?;
    }

    temp_file.persist(path).map_err(|e| {
        StrongPassError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}
