//! Connection (contact) operations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use quill_auth::BoxedSession;
use quill_core::{ApiRequest, BoxedApiClient, ClientResult, RetryExecutor};

/// State of a connection between the bot and another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// The other party's user id.
    pub user_id: i64,
    /// Current state of the connection.
    pub status: ConnectionStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionRequest {
    user_id: i64,
}

/// Connection operations bound to one session.
#[derive(Clone)]
pub struct ConnectionService {
    client: BoxedApiClient,
    executor: RetryExecutor,
    session: BoxedSession,
}

impl ConnectionService {
    pub fn new(client: BoxedApiClient, executor: RetryExecutor, session: BoxedSession) -> Self {
        Self {
            client,
            executor,
            session,
        }
    }

    /// Lists connections, optionally filtered by status.
    pub async fn list(&self, status: Option<ConnectionStatus>) -> ClientResult<Vec<Connection>> {
        let path = "/pod/v1/connection/list";
        let response = self
            .executor
            .execute("connection-list", path, || async {
                let mut request = ApiRequest::get(path);
                if let Some(status) = status {
                    request = request.query("status", status.as_str());
                }
                self.client.call(super::authed(&self.session, request)?).await
            })
            .await?;
        response.json()
    }

    /// Accepts a pending connection request from `user_id`.
    pub async fn accept(&self, user_id: i64) -> ClientResult<()> {
        self.decide("/pod/v1/connection/accept", user_id).await
    }

    /// Rejects a pending connection request from `user_id`.
    pub async fn reject(&self, user_id: i64) -> ClientResult<()> {
        self.decide("/pod/v1/connection/reject", user_id).await
    }

    async fn decide(&self, path: &str, user_id: i64) -> ClientResult<()> {
        self.executor
            .execute("connection-decide", path, || async {
                let request = ApiRequest::post(path).json(&ConnectionRequest { user_id })?;
                self.client.call(super::authed(&self.session, request)?).await
            })
            .await?;
        debug!(user_id, path, "Connection decision applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use quill_auth::AuthSession;
    use quill_core::{ApiClient, ApiResponse, RecoveryStrategy, RetryAttempts, RetryPolicy};

    struct StaticSession;

    #[async_trait]
    impl AuthSession for StaticSession {
        fn token(&self) -> Option<String> {
            Some("tok".to_string())
        }

        async fn refresh(&self) -> ClientResult<()> {
            Ok(())
        }
    }

    struct ConnectionApi {
        accepts: AtomicUsize,
    }

    #[async_trait]
    impl ApiClient for ConnectionApi {
        async fn call(&self, request: quill_core::ApiRequest) -> ClientResult<ApiResponse> {
            match request.path.as_str() {
                "/pod/v1/connection/list" => {
                    assert_eq!(
                        request.query,
                        vec![("status".to_string(), "PENDING".to_string())]
                    );
                    Ok(ApiResponse {
                        status: 200,
                        body: r#"[{"userId":5,"status":"PENDING"}]"#.to_string(),
                    })
                }
                "/pod/v1/connection/accept" => {
                    assert_eq!(request.body.as_ref().unwrap()["userId"], 5);
                    self.accepts.fetch_add(1, Ordering::SeqCst);
                    Ok(ApiResponse {
                        status: 200,
                        body: r#"{"userId":5,"status":"ACCEPTED"}"#.to_string(),
                    })
                }
                other => panic!("unexpected path: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn pending_connections_can_be_listed_and_accepted() {
        let api = Arc::new(ConnectionApi {
            accepts: AtomicUsize::new(0),
        });
        let service = ConnectionService::new(
            Arc::clone(&api) as _,
            RetryExecutor::new(
                RetryPolicy::new(RetryAttempts::Bounded(1)),
                RecoveryStrategy::new(),
            ),
            Arc::new(StaticSession),
        );

        let pending = service.list(Some(ConnectionStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user_id, 5);

        service.accept(pending[0].user_id).await.unwrap();
        assert_eq!(api.accepts.load(Ordering::SeqCst), 1);
    }
}
