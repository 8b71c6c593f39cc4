//! Key-backed signing capability.
//!
//! Authentication handshakes prove identity with a short-lived signed
//! token. The [`TokenSigner`] trait keeps the key format out of the
//! handshake code; [`RsaKeySigner`] is the production implementation,
//! tests substitute stubs.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;

use quill_core::{ClientError, ClientResult};

/// Lifetime of a signed authentication token.
const TOKEN_TTL: Duration = Duration::from_secs(300);

/// Signs short-lived authentication tokens for a subject identity.
pub trait TokenSigner: Send + Sync {
    /// Produces a signed token asserting `subject` right now.
    fn sign(&self, subject: &str) -> ClientResult<String>;
}

/// A shared, type-erased signer.
pub type BoxedSigner = Arc<dyn TokenSigner>;

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    iat: u64,
    exp: u64,
}

/// RS512 signer backed by an RSA private key in PEM form.
pub struct RsaKeySigner {
    key: EncodingKey,
}

impl RsaKeySigner {
    /// Parses the PEM key material.
    ///
    /// Malformed key material is an initialization failure: fatal, never
    /// retried.
    pub fn from_pem(pem: &[u8]) -> ClientResult<Self> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| ClientError::Initialization(format!("invalid RSA private key: {e}")))?;
        Ok(Self { key })
    }
}

impl TokenSigner for RsaKeySigner {
    fn sign(&self, subject: &str) -> ClientResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            sub: subject,
            iat: now,
            exp: now + TOKEN_TTL.as_secs(),
        };
        encode(&Header::new(Algorithm::RS512), &claims, &self.key)
            .map_err(|e| ClientError::Initialization(format!("token signing failed: {e}")))
    }
}

impl std::fmt::Debug for RsaKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeySigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_key_is_an_initialization_failure() {
        let result = RsaKeySigner::from_pem(b"not a key");
        assert!(matches!(result, Err(ClientError::Initialization(_))));
    }
}
