//! Session and message entities
//!
//! A [`Session`] is the client-side view of a chat: server metadata plus an
//! ordered transcript of [`Message`]s. Messages are immutable once their
//! status is terminal; the single exception is the trailing *placeholder*
//! (`status == Pending`), which is replaced in place while a response
//! streams in or a consensus run is pending.

use crate::consensus::channel::ChannelSnapshot;
use crate::core::ids::{ChannelId, ChatId, MessageId};
use crate::session::remote::{RemoteChat, RemoteMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder content shown while a consensus run is in flight.
pub const CONSENSUS_PLACEHOLDER: &str = "Running consensus...";

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Delivery state of a transcript row.
///
/// `Pending` marks the trailing placeholder; `Failed` marks a row whose
/// generation ended in an error. Failed rows stay in the transcript so the
/// failure remains auditable; they are never silently removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Pending,
    Complete,
    Failed,
}

/// A message in a conversation (Entity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Model tag for assistant rows, or the model selected when the user
    /// message was sent. `None` when unknown.
    pub model: Option<String>,
    pub is_consensus: bool,
    /// Channel reference recorded on a consensus placeholder once the
    /// initiating request has returned.
    pub channel_id: Option<ChannelId>,
    pub status: MessageStatus,
}

impl Message {
    /// An optimistic user message, committed locally before the server has
    /// confirmed it.
    pub fn user(id: MessageId, content: impl Into<String>, model: Option<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            model,
            is_consensus: false,
            channel_id: None,
            status: MessageStatus::Complete,
        }
    }

    /// An empty assistant placeholder for a direct streaming response.
    pub fn stream_placeholder(id: MessageId, model: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            model: Some(model.into()),
            is_consensus: false,
            channel_id: None,
            status: MessageStatus::Pending,
        }
    }

    /// An assistant placeholder for a pending consensus answer.
    pub fn consensus_placeholder(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: CONSENSUS_PLACEHOLDER.to_string(),
            timestamp: Utc::now(),
            model: Some("consensus".to_string()),
            is_consensus: true,
            channel_id: None,
            status: MessageStatus::Pending,
        }
    }

    /// Build a message from the server's representation.
    ///
    /// The store assigns the local id; the server timestamp is kept.
    pub fn from_remote(id: MessageId, remote: &RemoteMessage) -> Self {
        Self {
            id,
            role: remote.role,
            content: remote.content.clone(),
            timestamp: remote.created_at,
            model: Some(remote.model.clone()),
            is_consensus: remote.generation_mode.is_consensus(),
            channel_id: remote.channel_id.clone(),
            status: MessageStatus::Complete,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    /// Finalize a pending row with its terminal content.
    pub fn finalize(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.status = MessageStatus::Complete;
    }

    /// Mark a row failed, replacing its content with a failure indicator.
    /// The row itself persists.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.content = reason.into();
        self.status = MessageStatus::Failed;
    }
}

/// A chat session (Entity)
///
/// Identity is the server-assigned [`ChatId`]. The message list is the
/// single source of truth for what is rendered.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ChatId,
    pub title: Option<String>,
    pub default_model: String,
    pub messages: Vec<Message>,
    pub last_updated: DateTime<Utc>,
    /// Channels observed on the last full fetch, newest last.
    pub channels: Vec<ChannelSnapshot>,
}

impl Session {
    pub fn new(id: ChatId, title: Option<String>, default_model: impl Into<String>) -> Self {
        Self {
            id,
            title,
            default_model: default_model.into(),
            messages: Vec::new(),
            last_updated: Utc::now(),
            channels: Vec::new(),
        }
    }

    /// Build a session shell from server chat metadata (no messages yet).
    pub fn from_remote(remote: &RemoteChat) -> Self {
        Self {
            id: remote.id.clone(),
            title: remote.name.clone(),
            default_model: remote.default_model.clone(),
            messages: Vec::new(),
            last_updated: remote.updated_at,
            channels: Vec::new(),
        }
    }

    /// Display title: the server name or a fallback.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled chat")
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// True while the trailing message is a pending placeholder.
    pub fn has_pending_placeholder(&self) -> bool {
        self.last_message().is_some_and(Message::is_pending)
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}
