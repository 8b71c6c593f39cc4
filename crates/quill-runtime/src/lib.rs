//! # Quill Runtime
//!
//! Configuration, logging and wiring for Quill bots.
//!
//! The typical entry point is [`config::ConfigLoader`] followed by
//! [`bot::QuillBot::new`]; everything below that (transport, sessions,
//! feed clients, event loop, command registry) is assembled from the
//! configuration. The [`service`] module adds typed wrappers for the
//! platform's stream, user and connection resources.

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use bot::{OboServices, QuillBot};
pub use config::{ConfigLoader, QuillConfig};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, init_from_config};
