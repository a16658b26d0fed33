//! Configuration file loading for parley
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./parley.toml` or `./.parley.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/parley/config.toml`
//! 4. Fallback: `~/.config/parley/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBackendConfig, FileBehaviorConfig, FileChatConfig, FileConfig,
    FileConsensusConfig, FilePollingConfig,
};
pub use loader::ConfigLoader;
