//! Device secret storage adapters
//!
//! `FileKeystore` is the desktop stand-in for a platform keystore: the
//! secret lives in a permission-restricted file inside the data directory.
//! Mobile hosts are expected to supply their own `SecureStore` backed by the
//! OS keychain with while-unlocked protection.

use std::path::{Path, PathBuf};

use crate::domain::result::{Error, Result};
use crate::ports::{PresenceVerifier, SecureStore};

/// File name of the stored signing secret
const SECRET_FILE: &str = "signing.key";

/// File-backed secure store
pub struct FileKeystore {
    path: PathBuf,
}

impl FileKeystore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SECRET_FILE),
        }
    }

    /// Path of the secret file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecureStore for FileKeystore {
    fn get_secret(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let encoded = std::fs::read_to_string(&self.path)?;
        let secret = hex::decode(encoded.trim())
            .map_err(|e| Error::Signing(format!("Corrupt signing key file: {}", e)))?;
        Ok(Some(secret))
    }

    fn set_secret(&self, secret: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, hex::encode(secret))?;

        // Owner-only access; the platform keystore equivalent of
        // while-unlocked protection.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// Presence verifier with a fixed answer.
///
/// Hosts without an interactive challenge (scheduler entry point, tests)
/// use this; interactive frontends supply their own prompt-backed verifier.
pub struct StaticPresence {
    allow: bool,
}

impl StaticPresence {
    pub fn allowing() -> Self {
        Self { allow: true }
    }

    pub fn denying() -> Self {
        Self { allow: false }
    }
}

impl PresenceVerifier for StaticPresence {
    fn verify_presence(&self, _reason: &str) -> Result<()> {
        if self.allow {
            Ok(())
        } else {
            Err(Error::AuthDenied)
        }
    }
}
