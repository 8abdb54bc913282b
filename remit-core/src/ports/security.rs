//! Security ports - device secret storage and presence challenge
//!
//! The signing provider depends on two device primitives supplied by the
//! host platform: a secure store for the device-bound secret and a
//! user-presence challenge (biometric or passcode). Both are modeled as
//! ports so tests and the CLI can substitute their own backends.

use crate::domain::result::Result;

/// Device-bound secret storage.
///
/// Implementations must persist the secret with "accessible only while the
/// device is unlocked" protection (platform keystore, or a locked-down file
/// on desktop).
pub trait SecureStore: Send + Sync {
    /// Fetch the stored secret, if one exists
    fn get_secret(&self) -> Result<Option<Vec<u8>>>;

    /// Persist the secret, replacing any existing one
    fn set_secret(&self, secret: &[u8]) -> Result<()>;
}

/// User-presence challenge primitive.
///
/// A successful return means the user proved presence (biometric or device
/// passcode). Refusal or cancellation must surface as `Error::AuthDenied`
/// so the caller produces no signature and no side effect.
pub trait PresenceVerifier: Send + Sync {
    /// Run the challenge; `reason` is shown to the user
    fn verify_presence(&self, reason: &str) -> Result<()>;
}
