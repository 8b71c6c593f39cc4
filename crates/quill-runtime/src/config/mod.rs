//! Configuration loading and schema.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    BotConfig, DatafeedConfig, FeedMode, HostConfig, LogFormat, LoggingConfig, QuillConfig,
    RetryConfig,
};
