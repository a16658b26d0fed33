//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

use crate::http::auth::{AuthTokenSource, EnvToken, StaticToken};
use parley_domain::{ConsensusSetup, ProfileId, DEFAULT_MAX_ROUNDS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("polling.interval_ms cannot be 0")]
    InvalidPollInterval,

    #[error("model name cannot be empty")]
    EmptyModelName,
}

/// Raw backend connection configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Base URL of the chat backend
    pub base_url: String,
    /// Bearer token attached to every request
    pub token: Option<String>,
    /// Environment variable to read the token from on each request
    pub token_env: Option<String>,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            token_env: None,
        }
    }
}

impl FileBackendConfig {
    /// Build the credential source. An inline token wins over the
    /// environment variable indirection.
    pub fn auth_source(&self) -> Arc<dyn AuthTokenSource> {
        if let Some(token) = &self.token {
            Arc::new(StaticToken::new(token.clone()))
        } else if let Some(var) = &self.token_env {
            Arc::new(EnvToken::new(var.clone()))
        } else {
            Arc::new(StaticToken::anonymous())
        }
    }
}

/// Raw chat configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChatConfig {
    /// Model used when creating a new session
    pub default_model: Option<String>,
}

/// Raw consensus configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConsensusConfig {
    /// Server-side profile name; when set, the other fields are ignored
    pub profile: Option<String>,
    /// Model that steers the deliberation
    pub guiding_model: Option<String>,
    /// Models that participate in the deliberation
    pub participant_models: Vec<String>,
    /// Round cap for a deliberation
    pub max_rounds: Option<u32>,
}

impl FileConsensusConfig {
    /// Resolve the configured deliberation setup, if any.
    pub fn setup(&self) -> Option<ConsensusSetup> {
        if let Some(profile) = &self.profile {
            return Some(ConsensusSetup::Profile(ProfileId::from(profile.clone())));
        }
        let guiding = self.guiding_model.clone()?;
        if self.participant_models.is_empty() {
            return None;
        }
        Some(ConsensusSetup::Explicit {
            guiding_model: guiding,
            participant_models: self.participant_models.clone(),
            max_rounds: self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
        })
    }
}

/// Raw polling configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePollingConfig {
    /// Milliseconds between channel status polls
    pub interval_ms: u64,
}

impl Default for FilePollingConfig {
    fn default() -> Self {
        Self { interval_ms: 4000 }
    }
}

/// Raw behavior configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBehaviorConfig {
    /// Timeout in seconds for non-streaming API calls
    pub timeout_seconds: Option<u64>,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Backend connection settings
    pub backend: FileBackendConfig,
    /// Chat settings
    pub chat: FileChatConfig,
    /// Consensus settings
    pub consensus: FileConsensusConfig,
    /// Polling settings
    pub polling: FilePollingConfig,
    /// Behavior settings
    pub behavior: FileBehaviorConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(0) = self.behavior.timeout_seconds {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        if self.polling.interval_ms == 0 {
            return Err(ConfigValidationError::InvalidPollInterval);
        }

        let named_models = self
            .chat
            .default_model
            .iter()
            .chain(self.consensus.guiding_model.iter())
            .chain(self.consensus.participant_models.iter());
        for model in named_models {
            if model.trim().is_empty() {
                return Err(ConfigValidationError::EmptyModelName);
            }
        }

        Ok(())
    }
}
