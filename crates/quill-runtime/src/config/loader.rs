//! Configuration loader using figment.
//!
//! Sources are layered, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. TOML file (explicit via [`ConfigLoader::file`], or `quill.toml` /
//!    `config.toml` searched in the configured paths)
//! 4. Environment variables (`QUILL_*`)
//!
//! Environment variables map with the `QUILL_` prefix and `__` as the
//! section separator:
//!
//! - `QUILL_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `QUILL_BOT__USERNAME=ops-bot` → `bot.username = "ops-bot"`
//! - `QUILL_RETRY__MAX_ATTEMPTS=5` → `retry.max_attempts = 5`

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, trace, warn};

use super::schema::QuillConfig;
use crate::error::{ConfigError, ConfigResult};

/// File names searched when no explicit file is given.
const CONFIG_FILE_NAMES: &[&str] = &["quill.toml", "config.toml"];

/// Configuration loader with figment-based multi-source support.
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .file("quill.toml")
///     .load()?;
/// ```
pub struct ConfigLoader {
    /// Base figment instance holding programmatic overrides.
    figment: Figment,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables the `QUILL_*` environment layer.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: QuillConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<QuillConfig> {
        let figment = self.build_figment()?;

        let config: QuillConfig = figment
            .extract()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        debug!(
            host = %config.host.url,
            username = %config.bot.username,
            feed_mode = ?config.datafeed.mode,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(QuillConfig::default()));

        let overrides = std::mem::take(&mut self.figment);
        figment = figment.merge(overrides);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            figment = self.search_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with QUILL_ prefix");
            figment = figment.merge(
                Env::prefixed("QUILL_")
                    .split("__")
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment)
    }

    /// Searches for configuration files in the configured paths (the
    /// current directory when none were given).
    fn search_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = if self.search_paths.is_empty() {
            std::env::current_dir().into_iter().collect()
        } else {
            self.search_paths.clone()
        };

        for search_path in &search_paths {
            for name in CONFIG_FILE_NAMES {
                let path = search_path.join(name);
                if path.exists() {
                    info!(path = %path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(path));
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================
