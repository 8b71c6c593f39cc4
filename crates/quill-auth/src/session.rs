//! Authentication sessions.
//!
//! A session owns the current access token(s) for one identity. Tokens are
//! `None` until the first successful authenticate and are replaced
//! atomically by `refresh()`: readers never observe a half-updated pair.
//! Sessions are created at startup (service identity) or on first
//! delegation request (OBO) and live for the whole process; they are
//! replaced, never destroyed.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use quill_core::ClientResult;

/// The token pair held by a session.
///
/// Dual-token platforms carry a secondary (key-manager) token next to the
/// session token; single-token flows leave it `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPair {
    /// Primary session token.
    pub session: Option<String>,
    /// Secondary token, for dual-token platforms.
    pub key_manager: Option<String>,
}

/// Atomic storage for a session's tokens.
///
/// The whole pair is swapped under one lock so a reader can never see the
/// session token from one refresh and the key-manager token from another.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: RwLock<TokenPair>,
}

impl TokenStore {
    /// Creates an empty store (no token until first authenticate).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current pair.
    pub fn get(&self) -> TokenPair {
        self.tokens.read().clone()
    }

    /// Replaces the pair in a single assignment.
    pub fn set(&self, pair: TokenPair) {
        *self.tokens.write() = pair;
    }
}

/// An authenticated identity context.
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Returns the current session token, or `None` before the first
    /// successful authenticate.
    fn token(&self) -> Option<String>;

    /// Returns the secondary token on dual-token platforms.
    fn key_manager_token(&self) -> Option<String> {
        None
    }

    /// Re-runs the authentication handshake and atomically replaces the
    /// stored tokens.
    ///
    /// Fails with `Unauthorized` when the platform rejects the
    /// credentials.
    async fn refresh(&self) -> ClientResult<()>;
}

/// A shared, type-erased session.
pub type BoxedSession = Arc<dyn AuthSession>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pair_replaces_wholesale() {
        let store = TokenStore::new();
        assert_eq!(store.get(), TokenPair::default());

        store.set(TokenPair {
            session: Some("s1".into()),
            key_manager: Some("k1".into()),
        });
        store.set(TokenPair {
            session: Some("s2".into()),
            key_manager: None,
        });

        let pair = store.get();
        assert_eq!(pair.session.as_deref(), Some("s2"));
        assert_eq!(pair.key_manager, None);
    }
}
