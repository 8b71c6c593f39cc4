//! Session manager.
//!
//! Owns the credential sessions for one bot process: the primary service
//! identity plus any delegated (on-behalf-of) identities requested by the
//! application. Issued sessions are tracked in a registry so each can be
//! refreshed independently; refreshing one never touches another's tokens.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use quill_core::{
    BoxedApiClient, ClientError, ClientResult, ErrorClass, RecoveryStrategy, RetryAttempts,
    RetryExecutor, RetryPolicy, TransientKind,
};

use crate::authenticator::{BotAuthenticator, OboAuthenticator, OboTarget};
use crate::session::{AuthSession, BoxedSession, TokenStore};
use crate::signer::BoxedSigner;

/// The primary service-identity session.
pub struct ServiceSession {
    authenticator: Arc<BotAuthenticator>,
    tokens: TokenStore,
}

#[async_trait]
impl AuthSession for ServiceSession {
    fn token(&self) -> Option<String> {
        self.tokens.get().session
    }

    fn key_manager_token(&self) -> Option<String> {
        self.tokens.get().key_manager
    }

    async fn refresh(&self) -> ClientResult<()> {
        let pair = self.authenticator.authenticate().await?;
        self.tokens.set(pair);
        Ok(())
    }
}

/// A delegated (on-behalf-of) session.
///
/// `refresh()` repeats the full two-step handshake; the intermediate
/// application token is never reused.
pub struct OboSession {
    authenticator: Arc<OboAuthenticator>,
    target: OboTarget,
    tokens: TokenStore,
}

impl OboSession {
    /// Returns the delegated identity this session acts as.
    pub fn target(&self) -> &OboTarget {
        &self.target
    }
}

#[async_trait]
impl AuthSession for OboSession {
    fn token(&self) -> Option<String> {
        self.tokens.get().session
    }

    async fn refresh(&self) -> ClientResult<()> {
        let token = self.authenticator.authenticate(&self.target).await?;
        self.tokens.set(crate::session::TokenPair {
            session: Some(token),
            key_manager: None,
        });
        Ok(())
    }
}

/// Settings for the session manager.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Service-account login name.
    pub username: String,
    /// Application id for on-behalf-of handshakes.
    pub app_id: Option<String>,
    /// Whether the platform issues a secondary key-manager token.
    pub dual_token: bool,
}

/// Owns and issues credential sessions.
pub struct SessionManager {
    client: BoxedApiClient,
    signer: BoxedSigner,
    settings: AuthSettings,
    /// Sessions issued so far, in issue order.
    sessions: RwLock<Vec<BoxedSession>>,
}

impl SessionManager {
    /// Creates a manager over the given transport and signing capability.
    pub fn new(client: BoxedApiClient, signer: BoxedSigner, settings: AuthSettings) -> Self {
        Self {
            client,
            signer,
            settings,
            sessions: RwLock::new(Vec::new()),
        }
    }

    /// Retry configuration for login calls: transient failures back off,
    /// a 401 propagates (there is nothing to refresh during login).
    fn login_executor() -> RetryExecutor {
        RetryExecutor::new(
            RetryPolicy::new(RetryAttempts::Bounded(5)),
            RecoveryStrategy::new(),
        )
    }

    /// Authenticates the primary service identity.
    ///
    /// Startup-unreachable auth endpoints and rejected key material both
    /// surface as [`ClientError::Initialization`]: fatal, never fed back
    /// into the refresh recovery path.
    pub async fn authenticate_service(&self) -> ClientResult<Arc<ServiceSession>> {
        let authenticator = Arc::new(BotAuthenticator::new(
            Arc::clone(&self.client),
            Self::login_executor(),
            Arc::clone(&self.signer),
            self.settings.username.clone(),
            self.settings.dual_token,
        ));
        let session = Arc::new(ServiceSession {
            authenticator,
            tokens: TokenStore::new(),
        });

        session
            .refresh()
            .await
            .map_err(Self::as_startup_failure)?;
        info!(username = %self.settings.username, "Service session established");

        self.register(session.clone());
        Ok(session)
    }

    /// Authenticates a delegated identity.
    ///
    /// Requires an application id in the settings; the two-step handshake
    /// runs immediately, so the returned session already carries a token.
    pub async fn authenticate_obo(&self, target: OboTarget) -> ClientResult<Arc<OboSession>> {
        let Some(app_id) = &self.settings.app_id else {
            return Err(ClientError::Initialization(
                "on-behalf-of authentication requires an application id".into(),
            ));
        };

        let authenticator = Arc::new(OboAuthenticator::new(
            Arc::clone(&self.client),
            Self::login_executor(),
            Arc::clone(&self.signer),
            app_id.clone(),
        ));
        let session = Arc::new(OboSession {
            authenticator,
            target: target.clone(),
            tokens: TokenStore::new(),
        });

        session.refresh().await?;
        info!(target = %target, "OBO session established");

        self.register(session.clone());
        Ok(session)
    }

    /// Returns how many sessions this manager has issued.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    fn register(&self, session: BoxedSession) {
        self.sessions.write().push(session);
    }

    /// Startup authentication failures are fatal, not recoverable: an
    /// unreachable endpoint or an exhausted retry budget at this point
    /// means the process cannot come up.
    fn as_startup_failure(err: ClientError) -> ClientError {
        match &err {
            ClientError::RetriesExhausted { last, .. }
                if matches!(
                    last.class(),
                    Some(ErrorClass::Transient(
                        TransientKind::Connect | TransientKind::Timeout
                    ))
                ) =>
            {
                warn!(error = %err, "Auth endpoint unreachable at startup");
                ClientError::Initialization(format!("auth endpoint unreachable: {err}"))
            }
            _ => err,
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("username", &self.settings.username)
            .field("sessions", &self.sessions.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use quill_core::{ApiClient, ApiRequest, ApiResponse};

    use crate::signer::TokenSigner;

    struct StubSigner;

    impl TokenSigner for StubSigner {
        fn sign(&self, subject: &str) -> ClientResult<String> {
            Ok(format!("signed:{subject}"))
        }
    }

    /// Scripted API client: answers login endpoints with counted tokens.
    struct ScriptedAuthApi {
        logins: AtomicU32,
        app_logins: AtomicU32,
        obo_logins: AtomicU32,
    }

    impl ScriptedAuthApi {
        fn new() -> Self {
            Self {
                logins: AtomicU32::new(0),
                app_logins: AtomicU32::new(0),
                obo_logins: AtomicU32::new(0),
            }
        }

        fn token_body(token: String) -> ApiResponse {
            ApiResponse {
                status: 200,
                body: format!(r#"{{"token":"{token}"}}"#),
            }
        }
    }

    #[async_trait]
    impl ApiClient for ScriptedAuthApi {
        async fn call(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
            match request.path.as_str() {
                "/login/pubkey/authenticate" => {
                    let n = self.logins.fetch_add(1, Ordering::SeqCst);
                    Ok(Self::token_body(format!("svc-{n}")))
                }
                "/login/pubkey/app/authenticate" => {
                    let n = self.app_logins.fetch_add(1, Ordering::SeqCst);
                    Ok(Self::token_body(format!("app-{n}")))
                }
                path if path.starts_with("/login/pubkey/obo/") => {
                    let n = self.obo_logins.fetch_add(1, Ordering::SeqCst);
                    Ok(Self::token_body(format!("obo-{n}")))
                }
                other => Err(ClientError::permanent(404, other.to_string())),
            }
        }
    }

    fn manager(api: Arc<ScriptedAuthApi>) -> SessionManager {
        SessionManager::new(
            api,
            Arc::new(StubSigner),
            AuthSettings {
                username: "bot".into(),
                app_id: Some("app".into()),
                dual_token: false,
            },
        )
    }

    #[tokio::test]
    async fn service_session_has_token_after_authenticate() {
        let api = Arc::new(ScriptedAuthApi::new());
        let manager = manager(api);

        let session = manager.authenticate_service().await.unwrap();
        assert_eq!(session.token().as_deref(), Some("svc-0"));
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn obo_refresh_repeats_the_two_step_handshake() {
        let api = Arc::new(ScriptedAuthApi::new());
        let manager = manager(Arc::clone(&api));

        let session = manager
            .authenticate_obo(OboTarget::UserId(42))
            .await
            .unwrap();
        assert_eq!(session.token().as_deref(), Some("obo-0"));
        assert_eq!(api.app_logins.load(Ordering::SeqCst), 1);

        session.refresh().await.unwrap();
        assert_eq!(session.token().as_deref(), Some("obo-1"));
        // The app token was re-obtained, not reused.
        assert_eq!(api.app_logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refreshing_one_session_never_mutates_the_other() {
        let api = Arc::new(ScriptedAuthApi::new());
        let manager = manager(api);

        let service = manager.authenticate_service().await.unwrap();
        let obo = manager
            .authenticate_obo(OboTarget::Username("alice".into()))
            .await
            .unwrap();

        let service_before = service.token();
        obo.refresh().await.unwrap();
        assert_eq!(service.token(), service_before);

        let obo_before = obo.token();
        service.refresh().await.unwrap();
        assert_eq!(obo.token(), obo_before);
        assert_ne!(service.token(), service_before);
    }

    #[tokio::test]
    async fn obo_without_app_id_fails_initialization() {
        let api = Arc::new(ScriptedAuthApi::new());
        let manager = SessionManager::new(
            api,
            Arc::new(StubSigner),
            AuthSettings {
                username: "bot".into(),
                app_id: None,
                dual_token: false,
            },
        );

        let result = manager.authenticate_obo(OboTarget::UserId(1)).await;
        assert!(matches!(result, Err(ClientError::Initialization(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_endpoint_at_startup_is_fatal() {
        struct DownApi;

        #[async_trait]
        impl ApiClient for DownApi {
            async fn call(&self, _request: ApiRequest) -> ClientResult<ApiResponse> {
                Err(ClientError::transient(
                    TransientKind::Connect,
                    "connection refused",
                ))
            }
        }

        let manager = SessionManager::new(
            Arc::new(DownApi),
            Arc::new(StubSigner),
            AuthSettings {
                username: "bot".into(),
                app_id: None,
                dual_token: false,
            },
        );

        let result = manager.authenticate_service().await;
        assert!(matches!(result, Err(ClientError::Initialization(_))));
    }
}
