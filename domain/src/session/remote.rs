//! Server-side representations observed over the wire
//!
//! These mirror the backend's JSON bodies exactly and are deserialized
//! directly by the transport adapter. The store converts them into local
//! entities; nothing in the client ever mutates them.

use crate::consensus::channel::ChannelSnapshot;
use crate::core::ids::{ChannelId, ChatId};
use crate::session::entities::Role;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// How the server produced (or will produce) an assistant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Direct,
    Consensus,
}

impl GenerationMode {
    pub fn is_consensus(self) -> bool {
        self == GenerationMode::Consensus
    }
}

/// Chat metadata as returned by `POST /chats` and `GET /chats`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteChat {
    pub id: ChatId,
    pub name: Option<String>,
    pub default_model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored message as returned by the messages endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMessage {
    pub id: String,
    pub chat_id: ChatId,
    pub role: Role,
    pub model: String,
    pub content: String,
    #[serde(default)]
    pub generation_mode: GenerationMode,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    pub created_at: DateTime<Utc>,
}

/// Full chat body from `GET /chats/{id}`: metadata plus transcript and
/// any consensus channels attached to it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteChatDetail {
    pub id: ChatId,
    pub name: Option<String>,
    pub default_model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<RemoteMessage>,
    #[serde(default)]
    pub channels: Vec<ChannelSnapshot>,
}

impl RemoteChatDetail {
    pub fn meta(&self) -> RemoteChat {
        RemoteChat {
            id: self.id.clone(),
            name: self.name.clone(),
            default_model: self.default_model.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
