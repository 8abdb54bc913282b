//! Signing service - tamper-evident signatures over send payloads
//!
//! Every signature requires a fresh user-presence proof. The device-bound
//! secret is created lazily on first use and persisted through the
//! `SecureStore` port; the MAC is deterministic for identical payload and
//! secret, which keeps signing reproducible under a substituted backend in
//! tests.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::domain::result::{Error, Result};
use crate::domain::SendPayload;
use crate::ports::{PresenceVerifier, SecureStore};

type HmacSha256 = Hmac<Sha256>;

/// Algorithm label attached to every signature
pub const SIGNING_ALGORITHM: &str = "HMAC-SHA256";

/// Length of the generated device secret in bytes
const SECRET_LEN: usize = 32;

/// A signed canonical payload
#[derive(Debug, Clone)]
pub struct SignedPayload {
    /// Canonical JSON body that was signed
    pub body: String,
    /// Hex-encoded MAC over the body
    pub signature: String,
    /// Algorithm label, for forward compatibility
    pub algorithm: &'static str,
}

/// Service producing signatures gated by a device presence challenge
pub struct SigningService {
    store: Arc<dyn SecureStore>,
    presence: Arc<dyn PresenceVerifier>,
}

impl SigningService {
    pub fn new(store: Arc<dyn SecureStore>, presence: Arc<dyn PresenceVerifier>) -> Self {
        Self { store, presence }
    }

    /// Sign a send payload.
    ///
    /// Runs the presence challenge first: a refused or cancelled challenge
    /// returns `Error::AuthDenied` before the secret is touched or created,
    /// so a denied call leaves no side effect anywhere.
    pub fn sign(&self, payload: &SendPayload) -> Result<SignedPayload> {
        self.presence.verify_presence("Authenticate to sign")?;

        let secret = self.ensure_secret()?;
        let body_bytes = payload.canonical_bytes()?;

        let mut mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| Error::Signing(format!("Invalid secret length: {}", e)))?;
        mac.update(&body_bytes);
        let signature = hex::encode(mac.finalize().into_bytes());

        let body = String::from_utf8(body_bytes)
            .map_err(|e| Error::Signing(format!("Canonical payload is not UTF-8: {}", e)))?;

        Ok(SignedPayload {
            body,
            signature,
            algorithm: SIGNING_ALGORITHM,
        })
    }

    /// Fetch the device secret, creating and persisting it on first use
    fn ensure_secret(&self) -> Result<Vec<u8>> {
        if let Some(secret) = self.store.get_secret()? {
            return Ok(secret);
        }

        let mut secret = vec![0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        self.store.set_secret(&secret)?;
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::keystore::{FileKeystore, StaticPresence};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn sample_payload() -> SendPayload {
        SendPayload {
            id: "loc_fixed".to_string(),
            user_id: "demo-user".to_string(),
            amount: Decimal::new(10000, 2),
            currency: "USD".to_string(),
            to_address: "recipient-123".to_string(),
            rate: Decimal::new(23000, 0),
            fee: Decimal::new(100, 2),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap(),
            signature: None,
        }
    }

    fn service(dir: &TempDir, allow: bool) -> SigningService {
        let presence = if allow {
            StaticPresence::allowing()
        } else {
            StaticPresence::denying()
        };
        SigningService::new(Arc::new(FileKeystore::new(dir.path())), Arc::new(presence))
    }

    #[test]
    fn test_signature_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let signing = service(&dir, true);

        let first = signing.sign(&sample_payload()).unwrap();
        let second = signing.sign(&sample_payload()).unwrap();

        assert_eq!(first.signature, second.signature);
        assert_eq!(first.body, second.body);
        assert_eq!(first.algorithm, "HMAC-SHA256");
        assert_eq!(first.signature.len(), 64); // 32-byte MAC, hex
    }

    #[test]
    fn test_signature_varies_with_payload() {
        let dir = TempDir::new().unwrap();
        let signing = service(&dir, true);

        let base = signing.sign(&sample_payload()).unwrap();
        let mut changed = sample_payload();
        changed.amount = Decimal::new(10001, 2);
        let other = signing.sign(&changed).unwrap();

        assert_ne!(base.signature, other.signature);
    }

    #[test]
    fn test_secret_created_once_and_reused() {
        let dir = TempDir::new().unwrap();
        let keystore = FileKeystore::new(dir.path());
        let signing = SigningService::new(
            Arc::new(FileKeystore::new(dir.path())),
            Arc::new(StaticPresence::allowing()),
        );

        signing.sign(&sample_payload()).unwrap();
        let secret_after_first = keystore.get_secret().unwrap().unwrap();
        signing.sign(&sample_payload()).unwrap();
        let secret_after_second = keystore.get_secret().unwrap().unwrap();

        assert_eq!(secret_after_first, secret_after_second);
    }

    #[test]
    fn test_denied_challenge_has_no_side_effect() {
        let dir = TempDir::new().unwrap();
        let signing = service(&dir, false);

        let result = signing.sign(&sample_payload());
        assert!(matches!(result, Err(Error::AuthDenied)));

        // The denied call must not have minted a secret
        let keystore = FileKeystore::new(dir.path());
        assert!(keystore.get_secret().unwrap().is_none());
    }

    #[test]
    fn test_different_secrets_produce_different_signatures() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let sig_a = service(&dir_a, true).sign(&sample_payload()).unwrap();
        let sig_b = service(&dir_b, true).sign(&sample_payload()).unwrap();

        assert_eq!(sig_a.body, sig_b.body);
        assert_ne!(sig_a.signature, sig_b.signature);
    }
}
