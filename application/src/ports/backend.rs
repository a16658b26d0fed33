//! Backend gateway port
//!
//! Defines the interface for talking to the chat backend. The adapter
//! (reqwest, in the infrastructure layer) is a pure I/O boundary: it knows
//! nothing about session state, busy flags or placeholders.

use async_trait::async_trait;
use parley_domain::{
    ChannelId, ChannelSnapshot, ChatId, ConsensusProfile, ConsensusSetup, ProfileId, RemoteChat,
    RemoteChatDetail, RemoteMessage, StreamEvent,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during backend gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

/// Body of `POST /chats/{id}/messages` and its streaming sibling.
///
/// The streaming endpoint accepts the same shape minus the consensus
/// fields; [`SendMessageRequest::direct`] never sets them.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_consensus: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guiding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<ProfileId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
}

impl SendMessageRequest {
    /// A direct (single-model) send.
    pub fn direct(content: impl Into<String>, model: Option<String>) -> Self {
        Self {
            content: content.into(),
            model,
            use_consensus: None,
            guiding_model: None,
            participant_models: None,
            profile_id: None,
            max_rounds: None,
        }
    }

    /// A consensus-mode send. Profile and explicit selection are mutually
    /// exclusive by construction of [`ConsensusSetup`].
    pub fn consensus(content: impl Into<String>, setup: &ConsensusSetup) -> Self {
        let mut request = Self::direct(content, None);
        request.use_consensus = Some(true);
        match setup {
            ConsensusSetup::Profile(id) => {
                request.profile_id = Some(id.clone());
            }
            ConsensusSetup::Explicit {
                guiding_model,
                participant_models,
                max_rounds,
            } => {
                request.guiding_model = Some(guiding_model.clone());
                request.participant_models = Some(participant_models.clone());
                request.max_rounds = Some(*max_rounds);
            }
        }
        request
    }
}

/// Handle for receiving decoded text chunks from a streaming response.
///
/// Wraps an `mpsc::Receiver<StreamEvent>`; the adapter's producer task
/// feeds it and closes the channel when the body ends or the request's
/// cancellation token fires.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }
}

/// Gateway to the chat backend
///
/// One method per endpoint the orchestrator consumes. All calls carry the
/// auth credential supplied by the adapter's token source.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// `POST /chats`
    async fn create_chat(
        &self,
        name: Option<&str>,
        default_model: &str,
    ) -> Result<RemoteChat, GatewayError>;

    /// `GET /chats`
    async fn list_chats(&self) -> Result<Vec<RemoteChat>, GatewayError>;

    /// `GET /chats/{id}`
    async fn fetch_chat(&self, chat: &ChatId) -> Result<RemoteChatDetail, GatewayError>;

    /// `DELETE /chats/{id}`
    async fn delete_chat(&self, chat: &ChatId) -> Result<(), GatewayError>;

    /// `POST /chats/{id}/messages`
    async fn send_message(
        &self,
        chat: &ChatId,
        request: &SendMessageRequest,
    ) -> Result<RemoteMessage, GatewayError>;

    /// `POST /chats/{id}/messages/stream`
    ///
    /// The returned handle yields decoded text chunks; the token aborts
    /// the in-flight body read.
    async fn stream_message(
        &self,
        chat: &ChatId,
        request: &SendMessageRequest,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, GatewayError>;

    /// `GET /chats/{id}/messages`
    async fn list_messages(&self, chat: &ChatId) -> Result<Vec<RemoteMessage>, GatewayError>;

    /// `GET /channels/{id}`
    async fn channel_status(&self, channel: &ChannelId) -> Result<ChannelSnapshot, GatewayError>;

    /// `POST /chats/{id}/cancel`. Best-effort, failures are swallowed by
    /// the caller.
    async fn cancel_generation(&self, chat: &ChatId) -> Result<(), GatewayError>;

    /// `GET /profiles`
    async fn list_profiles(&self) -> Result<Vec<ConsensusProfile>, GatewayError>;
}
