//! # Quill Activity
//!
//! Command-pattern matching and dispatch for the Quill bot toolkit.
//!
//! The hosting application registers `(pattern, handler)` pairs on an
//! [`ActivityRegistry`] at startup and subscribes the registry to an
//! event loop; there is no scanning or runtime discovery. See
//! [`CommandPattern`] for the template syntax.

pub mod pattern;
pub mod registry;

pub use pattern::{ArgValue, Arguments, CommandPattern, PatternError};
pub use registry::{ActivityRegistry, BoxedCommandHandler, CommandContext, CommandHandler};
