//! Consensus channel status, as observed from the server
//!
//! A channel is a server-owned resource tracking one consensus run. The
//! client only ever reads it; completion is recognized solely by an
//! explicit terminal status, never by a timeout.

use crate::core::ids::ChannelId;
use serde::Deserialize;

/// Execution status of a consensus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Pending,
    Running,
    Finished,
    Error,
}

impl ChannelStatus {
    /// Terminal statuses end the polling loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelStatus::Finished | ChannelStatus::Error)
    }
}

/// One observation of a channel, from `GET /channels/{id}` or embedded in
/// a chat fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSnapshot {
    /// Present when the snapshot is embedded in a chat body; the status
    /// endpoint addresses the channel by path and omits it.
    #[serde(default)]
    pub id: Option<ChannelId>,
    pub status: ChannelStatus,
    #[serde(default)]
    pub rounds_executed: Option<u32>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChannelSnapshot {
    /// The failure text for an errored channel, with a fallback for
    /// servers that report no detail.
    pub fn error_text(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "consensus run failed".to_string())
    }
}
