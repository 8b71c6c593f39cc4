//! Authentication handshakes.
//!
//! Two handshakes exist:
//!
//! - **Service**: sign a token with the bot's key, exchange it for a
//!   session token (and a key-manager token on dual-token platforms).
//! - **On-behalf-of**: sign a token with the application key, exchange it
//!   for an application token, then exchange *that* for a per-user token.
//!   Refresh always repeats both steps; the application token is never
//!   assumed to still be valid.
//!
//! Every wire call goes through the retry executor bound at construction.
//! Login calls have no unauthorized recovery: a 401 here means the key
//! itself was rejected, which no refresh can fix.

use serde::{Deserialize, Serialize};
use tracing::debug;

use quill_core::{ApiRequest, BoxedApiClient, ClientResult, RetryExecutor};

use crate::session::TokenPair;
use crate::signer::BoxedSigner;

#[derive(Serialize)]
struct LoginRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// The delegated identity an OBO session acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OboTarget {
    /// Delegation by numeric user id.
    UserId(i64),
    /// Delegation by login name.
    Username(String),
}

impl std::fmt::Display for OboTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserId(id) => write!(f, "user:{id}"),
            Self::Username(name) => write!(f, "username:{name}"),
        }
    }
}

/// Performs the service-identity handshake.
pub struct BotAuthenticator {
    client: BoxedApiClient,
    executor: RetryExecutor,
    signer: BoxedSigner,
    username: String,
    dual_token: bool,
}

impl BotAuthenticator {
    /// Creates an authenticator for the given service account.
    ///
    /// With `dual_token` set, authentication also obtains the key-manager
    /// token from the relay endpoint.
    pub fn new(
        client: BoxedApiClient,
        executor: RetryExecutor,
        signer: BoxedSigner,
        username: impl Into<String>,
        dual_token: bool,
    ) -> Self {
        Self {
            client,
            executor,
            signer,
            username: username.into(),
            dual_token,
        }
    }

    /// Runs the full handshake and returns the fresh token pair.
    pub async fn authenticate(&self) -> ClientResult<TokenPair> {
        let session = self.login("/login/pubkey/authenticate").await?;
        let key_manager = if self.dual_token {
            Some(self.login("/relay/pubkey/authenticate").await?)
        } else {
            None
        };
        debug!(username = %self.username, "Service authentication succeeded");
        Ok(TokenPair {
            session: Some(session),
            key_manager,
        })
    }

    async fn login(&self, path: &str) -> ClientResult<String> {
        let signed = self.signer.sign(&self.username)?;
        let response = self
            .executor
            .execute("authenticate", path, || async {
                let request =
                    ApiRequest::post(path).json(&LoginRequest { token: &signed })?;
                self.client.call(request).await
            })
            .await?;
        let body: LoginResponse = response.json()?;
        Ok(body.token)
    }
}

/// Performs the two-step on-behalf-of handshake.
pub struct OboAuthenticator {
    client: BoxedApiClient,
    executor: RetryExecutor,
    signer: BoxedSigner,
    app_id: String,
}

impl OboAuthenticator {
    /// Creates an authenticator for the given application id.
    pub fn new(
        client: BoxedApiClient,
        executor: RetryExecutor,
        signer: BoxedSigner,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            executor,
            signer,
            app_id: app_id.into(),
        }
    }

    /// Runs both handshake steps and returns the per-user session token.
    pub async fn authenticate(&self, target: &OboTarget) -> ClientResult<String> {
        let app_token = self.authenticate_app().await?;

        let path = match target {
            OboTarget::UserId(id) => {
                format!("/login/pubkey/obo/user/{id}/authenticate")
            }
            OboTarget::Username(name) => {
                format!("/login/pubkey/obo/username/{name}/authenticate")
            }
        };
        let response = self
            .executor
            .execute("authenticate-obo", &path, || async {
                let request = ApiRequest::post(&path).session_token(&app_token);
                self.client.call(request).await
            })
            .await?;
        let body: LoginResponse = response.json()?;
        debug!(target = %target, "OBO authentication succeeded");
        Ok(body.token)
    }

    async fn authenticate_app(&self) -> ClientResult<String> {
        let signed = self.signer.sign(&self.app_id)?;
        let path = "/login/pubkey/app/authenticate";
        let response = self
            .executor
            .execute("authenticate-app", path, || async {
                let request =
                    ApiRequest::post(path).json(&LoginRequest { token: &signed })?;
                self.client.call(request).await
            })
            .await?;
        let body: LoginResponse = response.json()?;
        Ok(body.token)
    }
}
