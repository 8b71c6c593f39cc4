//! User lookup operations.

use serde::Deserialize;

use quill_auth::BoxedSession;
use quill_core::{ApiRequest, BoxedApiClient, ClientResult, RetryExecutor, UserRef};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

impl From<UserRecord> for UserRef {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.id,
            username: record.username,
            display_name: record.display_name,
        }
    }
}

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// User lookups bound to one session.
#[derive(Clone)]
pub struct UserService {
    client: BoxedApiClient,
    executor: RetryExecutor,
    session: BoxedSession,
}

impl UserService {
    pub fn new(client: BoxedApiClient, executor: RetryExecutor, session: BoxedSession) -> Self {
        Self {
            client,
            executor,
            session,
        }
    }

    /// Resolves a login name to a user.
    pub async fn by_username(&self, username: &str) -> ClientResult<UserRef> {
        let path = "/pod/v2/user";
        let response = self
            .executor
            .execute("user-by-username", path, || async {
                let request = ApiRequest::get(path).query("username", username);
                self.client.call(super::authed(&self.session, request)?).await
            })
            .await?;
        let record: UserRecord = response.json()?;
        Ok(record.into())
    }

    /// Resolves a batch of user ids.
    pub async fn by_ids(&self, ids: &[i64]) -> ClientResult<Vec<UserRef>> {
        let joined = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = "/pod/v3/users";
        let response = self
            .executor
            .execute("users-by-ids", path, || async {
                let request = ApiRequest::get(path).query("uid", &joined);
                self.client.call(super::authed(&self.session, request)?).await
            })
            .await?;
        let list: UserList = response.json()?;
        Ok(list.users.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

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

    struct LookupApi;

    #[async_trait]
    impl ApiClient for LookupApi {
        async fn call(&self, request: quill_core::ApiRequest) -> ClientResult<ApiResponse> {
            match request.path.as_str() {
                "/pod/v2/user" => {
                    assert_eq!(
                        request.query,
                        vec![("username".to_string(), "alice".to_string())]
                    );
                    Ok(ApiResponse {
                        status: 200,
                        body: r#"{"id":7,"username":"alice","displayName":"Alice"}"#.to_string(),
                    })
                }
                "/pod/v3/users" => {
                    assert_eq!(request.query, vec![("uid".to_string(), "1,2".to_string())]);
                    Ok(ApiResponse {
                        status: 200,
                        body: r#"{"users":[{"id":1},{"id":2}]}"#.to_string(),
                    })
                }
                other => panic!("unexpected path: {other}"),
            }
        }
    }

    fn service() -> UserService {
        UserService::new(
            Arc::new(LookupApi),
            RetryExecutor::new(
                RetryPolicy::new(RetryAttempts::Bounded(1)),
                RecoveryStrategy::new(),
            ),
            Arc::new(StaticSession),
        )
    }

    #[tokio::test]
    async fn username_lookup_maps_the_record() {
        let user = service().by_username("alice").await.unwrap();
        assert_eq!(user.user_id, 7);
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn id_batch_lookup_joins_ids() {
        let users = service().by_ids(&[1, 2]).await.unwrap();
        assert_eq!(users.len(), 2);
    }
}
