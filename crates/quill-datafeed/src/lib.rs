//! # Quill Datafeed
//!
//! Real-time event ingestion for the Quill bot toolkit.
//!
//! The platform delivers events over one of two long-poll protocols; the
//! [`FeedClient`] trait hides the difference, and [`EventLoop`] drives
//! whichever variant is configured, fanning events out to registered
//! [`EventListener`]s.
//!
//! Delivery is best-effort: when the platform invalidates a feed, the
//! clients transparently reacquire a fresh position, and events published
//! in between may be skipped. The cursor variant may also redeliver a
//! batch whose acknowledgment never landed. Neither exactly-once nor
//! at-most-once is guaranteed.

pub mod client;
pub mod event_loop;
mod wire;

pub use client::{
    BoxedFeedClient, CursorFeedClient, ExplicitFeedClient, FeedClient, FeedHandle,
};
pub use event_loop::{EventListener, EventLoop, ListenerError, ListenerId, LoopState};
