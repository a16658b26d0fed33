//! Consensus run configuration
//!
//! A consensus send names its models either through a saved profile or
//! through an explicit guiding-model + participant list. The two are
//! mutually exclusive, so the choice is an enum rather than a pair of
//! optional fields.

use crate::core::ids::ProfileId;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Default cap on discussion rounds, matching the server default.
pub const DEFAULT_MAX_ROUNDS: u32 = 8;

/// Model selection for a consensus send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusSetup {
    /// Use a saved profile by id.
    Profile(ProfileId),
    /// Ad-hoc selection.
    Explicit {
        guiding_model: String,
        participant_models: Vec<String>,
        max_rounds: u32,
    },
}

impl ConsensusSetup {
    pub fn explicit(
        guiding_model: impl Into<String>,
        participant_models: Vec<String>,
    ) -> Self {
        ConsensusSetup::Explicit {
            guiding_model: guiding_model.into(),
            participant_models,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

/// A saved guiding+participant configuration, server-owned.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusProfile {
    pub id: ProfileId,
    pub name: String,
    pub guiding_model: String,
    pub participant_models: Vec<String>,
    pub max_rounds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
