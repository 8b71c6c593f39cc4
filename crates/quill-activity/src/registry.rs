//! Command dispatch.
//!
//! [`ActivityRegistry`] is an [`EventListener`] that turns message events
//! into command invocations. Patterns are tried in registration order;
//! the first full match wins and later patterns are not consulted. Events
//! initiated by the bot's own identity are discarded before any matching,
//! so a bot can never trigger its own commands.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace};

use quill_core::{Event, UserRef};
use quill_datafeed::{EventListener, ListenerError};

use crate::pattern::{Arguments, CommandPattern};

/// Everything a handler needs to act on a matched command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Conversation the command arrived in.
    pub stream_id: String,
    /// Who issued the command.
    pub initiator: UserRef,
    /// Captured placeholder values.
    pub args: Arguments,
}

/// Invoked when its bound pattern matches an inbound message.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn on_command(&self, context: CommandContext) -> Result<(), ListenerError>;
}

/// A shared, type-erased command handler.
pub type BoxedCommandHandler = Arc<dyn CommandHandler>;

/// Matches inbound messages against registered command patterns.
pub struct ActivityRegistry {
    /// The bot's own identity, for self-loop prevention.
    bot_user_id: i64,
    patterns: RwLock<Vec<(CommandPattern, BoxedCommandHandler)>>,
}

impl ActivityRegistry {
    /// Creates an empty registry for a bot with the given identity.
    pub fn new(bot_user_id: i64) -> Self {
        Self {
            bot_user_id,
            patterns: RwLock::new(Vec::new()),
        }
    }

    /// Binds a handler to a pattern. Patterns match in registration order.
    pub fn register(&self, pattern: CommandPattern, handler: BoxedCommandHandler) {
        debug!(pattern = %pattern.source(), "Command registered");
        self.patterns.write().push((pattern, handler));
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.read().is_empty()
    }
}

#[async_trait]
impl EventListener for ActivityRegistry {
    async fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        if event.initiator.user_id == self.bot_user_id {
            trace!("Ignoring event initiated by the bot itself");
            return Ok(());
        }
        let Some(message) = event.message() else {
            return Ok(());
        };

        // Snapshot so a handler may register further commands.
        let patterns: Vec<_> = self.patterns.read().clone();
        for (pattern, handler) in &patterns {
            if let Some(args) = pattern.matches(message) {
                debug!(
                    pattern = %pattern.source(),
                    stream_id = %message.stream_id,
                    user_id = event.initiator.user_id,
                    "Command matched"
                );
                let context = CommandContext {
                    stream_id: message.stream_id.clone(),
                    initiator: event.initiator.clone(),
                    args,
                };
                return handler.on_command(context).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use quill_core::{EventPayload, InboundMessage, MessageEntity};

    const BOT_ID: i64 = 999;

    fn message_event(initiator: i64, text: &str, entities: Vec<MessageEntity>) -> Event {
        Event {
            initiator: UserRef::from_id(initiator),
            payload: EventPayload::MessageReceived(InboundMessage {
                message_id: "m1".to_string(),
                stream_id: "s1".to_string(),
                text: text.to_string(),
                entities,
            }),
        }
    }

    struct Tagging {
        tag: &'static str,
        hits: Arc<Mutex<Vec<(&'static str, CommandContext)>>>,
    }

    #[async_trait]
    impl CommandHandler for Tagging {
        async fn on_command(&self, context: CommandContext) -> Result<(), ListenerError> {
            self.hits.lock().push((self.tag, context));
            Ok(())
        }
    }

    fn registry_with(
        patterns: &[(&str, &'static str)],
    ) -> (ActivityRegistry, Arc<Mutex<Vec<(&'static str, CommandContext)>>>) {
        let registry = ActivityRegistry::new(BOT_ID);
        let hits = Arc::new(Mutex::new(Vec::new()));
        for (template, tag) in patterns {
            registry.register(
                CommandPattern::parse(template).unwrap(),
                Arc::new(Tagging {
                    tag,
                    hits: Arc::clone(&hits),
                }),
            );
        }
        (registry, hits)
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let (registry, hits) = registry_with(&[("/do {what}", "general"), ("/do it", "specific")]);

        registry
            .on_event(&message_event(1, "/do it", vec![]))
            .await
            .unwrap();

        let hits = hits.lock();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "general");
        assert_eq!(hits[0].1.args.word("what"), Some("it"));
    }

    #[tokio::test]
    async fn own_events_never_reach_handlers() {
        let (registry, hits) = registry_with(&[("/echo {what}", "echo")]);

        registry
            .on_event(&message_event(BOT_ID, "/echo hi", vec![]))
            .await
            .unwrap();
        assert!(hits.lock().is_empty());

        registry
            .on_event(&message_event(1, "/echo hi", vec![]))
            .await
            .unwrap();
        assert_eq!(hits.lock().len(), 1);
    }

    #[tokio::test]
    async fn context_carries_stream_initiator_and_args() {
        let (registry, hits) = registry_with(&[("/assign @{who}", "assign")]);

        registry
            .on_event(&message_event(
                7,
                "/assign @bob",
                vec![MessageEntity::Mention {
                    user_id: 42,
                    text: "@bob".to_string(),
                }],
            ))
            .await
            .unwrap();

        let hits = hits.lock();
        let context = &hits[0].1;
        assert_eq!(context.stream_id, "s1");
        assert_eq!(context.initiator.user_id, 7);
        assert_eq!(context.args.mention("who"), Some(42));
    }

    #[tokio::test]
    async fn non_message_events_are_ignored() {
        let (registry, hits) = registry_with(&[("/echo", "echo")]);

        let event = Event {
            initiator: UserRef::from_id(1),
            payload: EventPayload::RoomCreated {
                stream_id: "s1".to_string(),
                name: "ops".to_string(),
            },
        };
        registry.on_event(&event).await.unwrap();
        assert!(hits.lock().is_empty());
    }

    #[tokio::test]
    async fn handler_errors_propagate_to_the_loop() {
        struct Failing(AtomicUsize);

        #[async_trait]
        impl CommandHandler for Failing {
            async fn on_command(&self, _context: CommandContext) -> Result<(), ListenerError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err("handler exploded".into())
            }
        }

        let registry = ActivityRegistry::new(BOT_ID);
        let failing = Arc::new(Failing(AtomicUsize::new(0)));
        registry.register(CommandPattern::parse("/boom").unwrap(), failing.clone());

        let err = registry
            .on_event(&message_event(1, "/boom", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "handler exploded");
        assert_eq!(failing.0.load(Ordering::SeqCst), 1);
    }
}
