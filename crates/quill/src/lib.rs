//! # Quill
//!
//! A resilient bot-development toolkit for cloud messaging platforms.
//!
//! ## Overview
//!
//! Quill's core is an event-ingestion engine: it authenticates a bot
//! identity, pulls real-time events over one of two long-poll feed
//! protocols, and dispatches them to listeners and command handlers.
//! Every remote call runs through a retry executor that backs off on
//! transient failures and refreshes credentials on unauthorized ones.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐    ┌────────────┐    ┌───────────┐    ┌──────────────────┐
//! │ FeedClient│───▶│ EventLoop  │───▶│ Listeners │───▶│ ActivityRegistry │
//! │ (pull)    │    │ (dispatch) │    │           │    │ (commands)       │
//! └─────┬─────┘    └────────────┘    └───────────┘    └──────────────────┘
//!       │ every call
//! ┌─────▼─────────┐     refresh on unauthorized     ┌────────────────┐
//! │ RetryExecutor │────────────────────────────────▶│ SessionManager │
//! └───────────────┘                                 └────────────────┘
//! ```
//!
//! - **quill-core**: error taxonomy, retry executor, event model
//! - **quill-transport**: reqwest-backed platform client
//! - **quill-auth**: service and on-behalf-of sessions
//! - **quill-datafeed**: feed clients and the ingestion loop
//! - **quill-activity**: command patterns and dispatch
//! - **quill-runtime**: configuration, logging and the [`QuillBot`] facade
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quill::prelude::*;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl CommandHandler for Echo {
//!     async fn on_command(&self, ctx: CommandContext) -> Result<(), ListenerError> {
//!         println!("{} said {:?}", ctx.initiator.user_id, ctx.args.word("what"));
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> RuntimeResult<()> {
//!     let config = ConfigLoader::new().load()?;
//!     quill::runtime::init_from_config(&config.logging);
//!
//!     let bot = QuillBot::new(config).await?;
//!     bot.command("/echo {what}", Arc::new(Echo))?;
//!     bot.run().await
//! }
//! ```

pub use quill_activity as activity;
pub use quill_auth as auth;
pub use quill_core as core;
pub use quill_datafeed as datafeed;
pub use quill_runtime as runtime;
pub use quill_transport as transport;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use quill_runtime::{ConfigLoader, QuillBot, QuillConfig, RuntimeError, RuntimeResult};

    // Commands
    pub use quill_activity::{
        ActivityRegistry, Arguments, CommandContext, CommandHandler, CommandPattern,
    };

    // Event model and listeners
    pub use quill_core::{Event, EventKind, EventPayload, InboundMessage, MessageEntity, UserRef};
    pub use quill_datafeed::{EventListener, EventLoop, ListenerError, ListenerId};

    // Errors and retry configuration
    pub use quill_core::{
        ClientError, ClientResult, RecoveryStrategy, RetryAttempts, RetryExecutor, RetryPolicy,
    };

    // Authentication
    pub use quill_auth::{AuthSession, OboTarget, SessionManager};
}
