//! Bot wiring facade.
//!
//! [`QuillBot`] assembles the whole stack from a [`QuillConfig`]: the HTTP
//! transport, the service session, a retry executor whose recovery path
//! refreshes that session on unauthorized, the configured feed variant,
//! the event loop and the command registry. The hosting application
//! registers commands and listeners, then drives the loop with
//! [`run`](QuillBot::run).
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().load()?;
//! logging::init_from_config(&config.logging);
//!
//! let bot = QuillBot::new(config).await?;
//! bot.command("/echo {what}", Arc::new(EchoHandler))?;
//! bot.run().await?;
//! ```

use std::sync::Arc;

use tracing::info;

use quill_activity::{ActivityRegistry, BoxedCommandHandler, CommandPattern};
use quill_auth::{AuthSettings, BoxedSession, OboTarget, RsaKeySigner, SessionManager};
use quill_core::{
    BoxedApiClient, ClientError, RecoveryStrategy, RetryExecutor,
};
use quill_datafeed::{
    BoxedFeedClient, CursorFeedClient, EventListener, EventLoop, ExplicitFeedClient, ListenerId,
};
use quill_transport::HttpApiClient;

use crate::config::{FeedMode, QuillConfig};
use crate::error::RuntimeResult;
use crate::service::{ConnectionService, StreamService, UserService};

/// Resource services bound to a delegated (on-behalf-of) session.
pub struct OboServices {
    pub streams: StreamService,
    pub users: UserService,
    pub connections: ConnectionService,
}

/// A fully wired bot: transport, sessions, feed, loop and commands.
pub struct QuillBot {
    client: BoxedApiClient,
    sessions: Arc<SessionManager>,
    service_session: BoxedSession,
    executor: RetryExecutor,
    event_loop: Arc<EventLoop>,
    registry: Arc<ActivityRegistry>,
}

impl QuillBot {
    /// Builds and authenticates a bot from its configuration.
    ///
    /// Authenticates the service identity eagerly; key material or an
    /// unreachable auth endpoint fail here, not later mid-run.
    pub async fn new(config: QuillConfig) -> RuntimeResult<Self> {
        let client: BoxedApiClient = Arc::new(HttpApiClient::with_timeout(
            &config.host.url,
            std::time::Duration::from_millis(config.host.timeout_ms),
        )?);

        let pem = std::fs::read(&config.bot.private_key_path).map_err(|e| {
            ClientError::Initialization(format!(
                "cannot read private key {}: {e}",
                config.bot.private_key_path.display()
            ))
        })?;
        let signer = Arc::new(RsaKeySigner::from_pem(&pem)?);

        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&client),
            signer,
            AuthSettings {
                username: config.bot.username.clone(),
                app_id: config.bot.app_id.clone(),
                dual_token: config.bot.dual_token,
            },
        ));
        let service_session: BoxedSession = sessions.authenticate_service().await?;

        let executor = RetryExecutor::new(
            config.retry.to_policy(),
            Self::refresh_recovery(Arc::clone(&service_session)),
        );

        let feed = Self::build_feed(&config, &client, &executor, &service_session);
        let event_loop = Arc::new(EventLoop::new(feed));

        let registry = Arc::new(ActivityRegistry::new(config.bot.user_id));
        event_loop.subscribe(Arc::clone(&registry) as Arc<dyn EventListener>);

        info!(
            username = %config.bot.username,
            feed_mode = ?config.datafeed.mode,
            "Bot wired"
        );

        Ok(Self {
            client,
            sessions,
            service_session,
            executor,
            event_loop,
            registry,
        })
    }

    /// Recovery strategy refreshing `session` on any unauthorized error.
    fn refresh_recovery(session: BoxedSession) -> RecoveryStrategy {
        RecoveryStrategy::new().on_unauthorized(move || {
            let session = Arc::clone(&session);
            Box::pin(async move { session.refresh().await })
        })
    }

    fn build_feed(
        config: &QuillConfig,
        client: &BoxedApiClient,
        executor: &RetryExecutor,
        session: &BoxedSession,
    ) -> BoxedFeedClient {
        match config.datafeed.mode {
            FeedMode::Explicit => {
                let mut feed = ExplicitFeedClient::new(
                    Arc::clone(client),
                    executor.clone(),
                    Arc::clone(session),
                );
                if let Some(id) = &config.datafeed.persisted_feed_id {
                    feed = feed.with_persisted_id(id);
                }
                Arc::new(feed)
            }
            FeedMode::Cursor => Arc::new(CursorFeedClient::new(
                Arc::clone(client),
                executor.clone(),
                Arc::clone(session),
            )),
        }
    }

    /// Binds a handler to a command template.
    pub fn command(&self, template: &str, handler: BoxedCommandHandler) -> RuntimeResult<()> {
        let pattern = CommandPattern::parse(template)?;
        self.registry.register(pattern, handler);
        Ok(())
    }

    /// Subscribes a raw event listener alongside the command registry.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.event_loop.subscribe(listener)
    }

    /// Runs the ingestion loop until [`stop`](Self::stop) or a fatal
    /// feed failure.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.event_loop.run().await.map_err(Into::into)
    }

    /// Requests a graceful stop of the ingestion loop.
    pub fn stop(&self) {
        self.event_loop.stop();
    }

    /// The event loop, for callers managing lifecycle directly.
    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.event_loop
    }

    /// The session manager, for delegated authentication.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Stream operations as the bot.
    pub fn streams(&self) -> StreamService {
        StreamService::new(
            Arc::clone(&self.client),
            self.executor.clone(),
            Arc::clone(&self.service_session),
        )
    }

    /// User lookups as the bot.
    pub fn users(&self) -> UserService {
        UserService::new(
            Arc::clone(&self.client),
            self.executor.clone(),
            Arc::clone(&self.service_session),
        )
    }

    /// Connection operations as the bot.
    pub fn connections(&self) -> ConnectionService {
        ConnectionService::new(
            Arc::clone(&self.client),
            self.executor.clone(),
            Arc::clone(&self.service_session),
        )
    }

    /// Authenticates a delegated identity and returns services bound to
    /// it. Each service call then acts as that user, with unauthorized
    /// recovery refreshing the delegated session, not the bot's.
    pub async fn obo(&self, target: OboTarget) -> RuntimeResult<OboServices> {
        let session: BoxedSession = self.sessions.authenticate_obo(target).await?;
        let executor = RetryExecutor::new(
            self.executor.policy().clone(),
            Self::refresh_recovery(Arc::clone(&session)),
        );
        Ok(OboServices {
            streams: StreamService::new(
                Arc::clone(&self.client),
                executor.clone(),
                Arc::clone(&session),
            ),
            users: UserService::new(
                Arc::clone(&self.client),
                executor.clone(),
                Arc::clone(&session),
            ),
            connections: ConnectionService::new(Arc::clone(&self.client), executor, session),
        })
    }
}

impl std::fmt::Debug for QuillBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuillBot")
            .field("sessions", &self.sessions)
            .field("commands", &self.registry.len())
            .finish_non_exhaustive()
    }
}
