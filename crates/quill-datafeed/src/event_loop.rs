//! Event ingestion loop.
//!
//! [`EventLoop`] owns one feed position and drives it: acquire the feed,
//! pull batches until told to stop, release the feed. Every event in a
//! batch is dispatched sequentially, in listener registration order, and
//! a listener failure is logged and contained so later listeners still
//! see the event.
//!
//! The loop itself runs wherever the caller awaits [`EventLoop::run`];
//! spawning it on a task and keeping the `Arc` around for
//! [`EventLoop::stop`] is the usual arrangement.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use quill_core::{ClientError, ClientResult, Event};

use crate::client::{BoxedFeedClient, FeedHandle};

/// Listener failures are opaque to the loop; they are logged, never acted on.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every event the loop pulls.
///
/// Implementations must tolerate being called concurrently with their own
/// registration changes: the loop dispatches to a snapshot of the listener
/// set, so a listener may still receive the in-flight event right after
/// unsubscribing.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &Event) -> Result<(), ListenerError>;
}

/// Opaque subscription handle returned by [`EventLoop::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Lifecycle of an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Pulls batches from a feed client and fans each event out to listeners.
pub struct EventLoop {
    feed: BoxedFeedClient,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn EventListener>)>>,
    next_id: AtomicU64,
    state: RwLock<LoopState>,
    shutdown: Mutex<CancellationToken>,
}

impl EventLoop {
    /// Creates a loop over the given feed client, with no listeners.
    pub fn new(feed: BoxedFeedClient) -> Self {
        Self {
            feed,
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            state: RwLock::new(LoopState::Created),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    /// Registers a listener; events are dispatched in registration order.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        debug!(listener_id = id.0, "Listener subscribed");
        id
    }

    /// Removes a listener. Returns false if the id was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        *self.state.read()
    }

    /// Requests a graceful stop; the in-flight pull is abandoned and the
    /// feed released. Idempotent, and a no-op before [`run`](Self::run).
    pub fn stop(&self) {
        // Same lock order as run(): state, then shutdown. Holding the
        // state lock across the cancel keeps stop atomic with run()'s
        // startup, so the token cancelled here is the one run() polls.
        let mut state = self.state.write();
        if *state == LoopState::Running {
            *state = LoopState::Stopping;
        }
        self.shutdown.lock().cancel();
    }

    /// Acquires the feed and pulls until stopped or a fatal error.
    ///
    /// Returns `Ok(())` on a clean stop. A pull failure the retry layer
    /// could not recover (exhausted retries, permanent rejection) drives
    /// the loop to `Stopped` and is returned to the caller.
    pub async fn run(&self) -> ClientResult<()> {
        // The Running transition and the fresh-token install must be one
        // critical section: a concurrent stop() that observes Running has
        // to cancel this cycle's token, not a stale one. The token is
        // fresh per cycle so a restart is not born cancelled.
        let shutdown = {
            let mut state = self.state.write();
            match *state {
                LoopState::Created | LoopState::Stopped => *state = LoopState::Running,
                LoopState::Running | LoopState::Stopping => {
                    return Err(ClientError::Initialization(
                        "event loop is already running".to_string(),
                    ));
                }
            }
            let mut guard = self.shutdown.lock();
            *guard = CancellationToken::new();
            guard.clone()
        };

        let mut handle = match self.feed.start().await {
            Ok(handle) => handle,
            Err(err) => {
                *self.state.write() = LoopState::Stopped;
                return Err(err);
            }
        };
        info!("Event loop started");

        let outcome = loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Event loop stopping");
                    break Ok(());
                }
                pulled = self.feed.pull(handle.clone()) => match pulled {
                    Ok((events, next)) => {
                        handle = next;
                        self.dispatch(&events).await;
                    }
                    Err(err) => {
                        error!(error = %err, "Feed pull failed beyond recovery");
                        break Err(err);
                    }
                }
            }
        };

        if outcome.is_ok()
            && let Err(err) = self.feed.stop(handle).await
        {
            warn!(error = %err, "Failed to release feed on shutdown");
        }

        *self.state.write() = LoopState::Stopped;
        info!("Event loop stopped");
        outcome
    }

    async fn dispatch(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        // Snapshot so a listener may (un)subscribe during dispatch without
        // deadlocking on the registration lock.
        let listeners: Vec<_> = self.listeners.read().clone();
        debug!(
            events = events.len(),
            listeners = listeners.len(),
            "Dispatching batch"
        );
        for event in events {
            for (id, listener) in &listeners {
                if let Err(err) = listener.on_event(event).await {
                    error!(
                        listener_id = id.0,
                        error = %err,
                        "Listener failed; continuing with remaining listeners"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use quill_core::{EventPayload, InboundMessage, UserRef};

    use crate::client::FeedClient;

    fn message_event(id: &str) -> Event {
        Event {
            initiator: UserRef::from_id(1),
            payload: EventPayload::MessageReceived(InboundMessage {
                message_id: id.to_string(),
                stream_id: "s1".to_string(),
                text: "hi".to_string(),
                entities: Vec::new(),
            }),
        }
    }

    /// Feed serving scripted batches, then blocking like a long poll.
    ///
    /// Each batch costs one gate permit, so tests can hold the feed
    /// between batches.
    struct ScriptedFeed {
        batches: Mutex<VecDeque<ClientResult<Vec<Event>>>>,
        gate: tokio::sync::Semaphore,
        stops: AtomicU64,
    }

    impl ScriptedFeed {
        fn new(batches: Vec<ClientResult<Vec<Event>>>) -> Arc<Self> {
            let len = batches.len();
            Arc::new(Self {
                batches: Mutex::new(batches.into_iter().collect()),
                gate: tokio::sync::Semaphore::new(len),
                stops: AtomicU64::new(0),
            })
        }

        fn gated(batches: Vec<ClientResult<Vec<Event>>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into_iter().collect()),
                gate: tokio::sync::Semaphore::new(1),
                stops: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl FeedClient for ScriptedFeed {
        async fn start(&self) -> ClientResult<FeedHandle> {
            Ok(FeedHandle::feed("f1".to_string()))
        }

        async fn pull(&self, handle: FeedHandle) -> ClientResult<(Vec<Event>, FeedHandle)> {
            self.gate.acquire().await.unwrap().forget();
            let next = self.batches.lock().pop_front();
            match next {
                Some(batch) => batch.map(|events| (events, handle)),
                None => futures::future::pending().await,
            }
        }

        async fn stop(&self, _handle: FeedHandle) -> ClientResult<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Records `(tag, message_id)` pairs, optionally failing every call.
    struct Recorder {
        tag: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventListener for Recorder {
        async fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
            let id = event.message().map(|m| m.message_id.clone()).unwrap_or_default();
            self.seen.lock().push((self.tag, id));
            if self.fail {
                return Err("listener exploded".into());
            }
            Ok(())
        }
    }

    async fn wait_for(seen: &Arc<Mutex<Vec<(&'static str, String)>>>, count: usize) {
        while seen.lock().len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatches_in_registration_order_and_stops_cleanly() {
        let feed = ScriptedFeed::new(vec![Ok(vec![message_event("m1"), message_event("m2")])]);
        let event_loop = Arc::new(EventLoop::new(Arc::clone(&feed) as _));
        let seen = Arc::new(Mutex::new(Vec::new()));

        event_loop.subscribe(Arc::new(Recorder {
            tag: "a",
            seen: Arc::clone(&seen),
            fail: false,
        }));
        event_loop.subscribe(Arc::new(Recorder {
            tag: "b",
            seen: Arc::clone(&seen),
            fail: false,
        }));

        let runner = tokio::spawn({
            let event_loop = Arc::clone(&event_loop);
            async move { event_loop.run().await }
        });

        wait_for(&seen, 4).await;
        event_loop.stop();
        runner.await.unwrap().unwrap();

        let order: Vec<_> = seen.lock().clone();
        assert_eq!(
            order,
            vec![
                ("a", "m1".to_string()),
                ("b", "m1".to_string()),
                ("a", "m2".to_string()),
                ("b", "m2".to_string()),
            ]
        );
        assert_eq!(event_loop.state(), LoopState::Stopped);
        assert_eq!(feed.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_listener_never_blocks_the_next_one() {
        let feed = ScriptedFeed::new(vec![Ok(vec![message_event("m1")])]);
        let event_loop = Arc::new(EventLoop::new(feed as _));
        let seen = Arc::new(Mutex::new(Vec::new()));

        event_loop.subscribe(Arc::new(Recorder {
            tag: "failing",
            seen: Arc::clone(&seen),
            fail: true,
        }));
        event_loop.subscribe(Arc::new(Recorder {
            tag: "healthy",
            seen: Arc::clone(&seen),
            fail: false,
        }));

        let runner = tokio::spawn({
            let event_loop = Arc::clone(&event_loop);
            async move { event_loop.run().await }
        });

        wait_for(&seen, 2).await;
        event_loop.stop();
        runner.await.unwrap().unwrap();

        assert_eq!(seen.lock()[1], ("healthy", "m1".to_string()));
    }

    #[tokio::test]
    async fn fatal_pull_error_surfaces_from_run() {
        let feed = ScriptedFeed::new(vec![Err(ClientError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ClientError::transient(
                quill_core::TransientKind::Unavailable,
                "still down",
            )),
        })]);
        let event_loop = EventLoop::new(Arc::clone(&feed) as _);

        let err = event_loop.run().await.unwrap_err();
        assert!(matches!(err, ClientError::RetriesExhausted { .. }));
        assert_eq!(event_loop.state(), LoopState::Stopped);
        // Broken feeds are not released.
        assert_eq!(feed.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_restarts_after_clean_stop() {
        let feed = ScriptedFeed::new(vec![Ok(vec![message_event("m1")]), Ok(vec![
            message_event("m2"),
        ])]);
        let event_loop = Arc::new(EventLoop::new(feed as _));
        let seen = Arc::new(Mutex::new(Vec::new()));
        event_loop.subscribe(Arc::new(Recorder {
            tag: "a",
            seen: Arc::clone(&seen),
            fail: false,
        }));

        for expected in [1usize, 2] {
            let runner = tokio::spawn({
                let event_loop = Arc::clone(&event_loop);
                async move { event_loop.run().await }
            });
            wait_for(&seen, expected).await;
            event_loop.stop();
            runner.await.unwrap().unwrap();
            assert_eq!(event_loop.state(), LoopState::Stopped);
        }

        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_stop_never_cancels_a_new_cycle() {
        let feed = ScriptedFeed::new(vec![Ok(vec![message_event("m1")])]);
        let event_loop = Arc::new(EventLoop::new(feed as _));
        let seen = Arc::new(Mutex::new(Vec::new()));
        event_loop.subscribe(Arc::new(Recorder {
            tag: "a",
            seen: Arc::clone(&seen),
            fail: false,
        }));

        // A stop before run() cancels a token no cycle will ever poll.
        event_loop.stop();
        assert_eq!(event_loop.state(), LoopState::Created);

        let runner = tokio::spawn({
            let event_loop = Arc::clone(&event_loop);
            async move { event_loop.run().await }
        });

        // The cycle still pulls: startup swapped in its own token under
        // the same lock as the Running transition.
        wait_for(&seen, 1).await;
        assert_eq!(event_loop.state(), LoopState::Running);

        // And the first stop observed after startup lands for good.
        event_loop.stop();
        runner.await.unwrap().unwrap();
        assert_eq!(event_loop.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribed_listener_receives_nothing_further() {
        let feed = ScriptedFeed::gated(vec![
            Ok(vec![message_event("m1")]),
            Ok(vec![message_event("m2")]),
        ]);
        let event_loop = Arc::new(EventLoop::new(Arc::clone(&feed) as _));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let id = event_loop.subscribe(Arc::new(Recorder {
            tag: "a",
            seen: Arc::clone(&seen),
            fail: false,
        }));
        let keeper = event_loop.subscribe(Arc::new(Recorder {
            tag: "b",
            seen: Arc::clone(&seen),
            fail: false,
        }));

        let runner = tokio::spawn({
            let event_loop = Arc::clone(&event_loop);
            async move { event_loop.run().await }
        });

        wait_for(&seen, 2).await;
        assert!(event_loop.unsubscribe(id));
        assert!(!event_loop.unsubscribe(id));
        feed.gate.add_permits(1);

        wait_for(&seen, 3).await;
        event_loop.stop();
        runner.await.unwrap().unwrap();

        let order: Vec<_> = seen.lock().clone();
        assert_eq!(order[2], ("b", "m2".to_string()));
        let _ = keeper;
    }
}
