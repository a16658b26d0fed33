//! Scripted backend gateway for orchestration tests
//!
//! Each endpoint pops its next scripted result from a queue; streaming
//! responses replay a scripted chunk sequence and can optionally hold the
//! stream open until the request's cancellation token fires, which is how
//! the cancel-mid-stream scenarios are driven.

use crate::ports::backend::{
    BackendGateway, GatewayError, SendMessageRequest, StreamHandle,
};
use async_trait::async_trait;
use chrono::Utc;
use parley_domain::{
    ChannelId, ChannelSnapshot, ChatId, ConsensusProfile, GenerationMode, RemoteChat,
    RemoteChatDetail, RemoteMessage, Role, StreamEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted streaming response.
pub struct StreamScript {
    pub events: Vec<StreamEvent>,
    /// Keep the stream open after the scripted events until the request's
    /// cancellation token fires.
    pub hold_open: bool,
}

impl StreamScript {
    pub fn completed(chunks: &[&str]) -> Self {
        let mut events: Vec<StreamEvent> =
            chunks.iter().map(|c| StreamEvent::Delta(c.to_string())).collect();
        let full: String = chunks.concat();
        events.push(StreamEvent::Completed(full));
        Self {
            events,
            hold_open: false,
        }
    }

    pub fn held_open(chunks: &[&str]) -> Self {
        Self {
            events: chunks.iter().map(|c| StreamEvent::Delta(c.to_string())).collect(),
            hold_open: true,
        }
    }
}

#[derive(Default)]
pub struct MockGateway {
    creates: Mutex<VecDeque<Result<RemoteChat, GatewayError>>>,
    chat_lists: Mutex<VecDeque<Result<Vec<RemoteChat>, GatewayError>>>,
    chat_details: Mutex<VecDeque<Result<RemoteChatDetail, GatewayError>>>,
    sends: Mutex<VecDeque<Result<RemoteMessage, GatewayError>>>,
    streams: Mutex<VecDeque<Result<StreamScript, GatewayError>>>,
    statuses: Mutex<VecDeque<Result<ChannelSnapshot, GatewayError>>>,
    transcripts: Mutex<VecDeque<Result<Vec<RemoteMessage>, GatewayError>>>,
    deletes: Mutex<VecDeque<Result<(), GatewayError>>>,
    cancel_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    cancel_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create(&self, result: Result<RemoteChat, GatewayError>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub fn push_chat_list(&self, result: Result<Vec<RemoteChat>, GatewayError>) {
        self.chat_lists.lock().unwrap().push_back(result);
    }

    pub fn push_chat_detail(&self, result: Result<RemoteChatDetail, GatewayError>) {
        self.chat_details.lock().unwrap().push_back(result);
    }

    pub fn push_send(&self, result: Result<RemoteMessage, GatewayError>) {
        self.sends.lock().unwrap().push_back(result);
    }

    pub fn push_stream(&self, result: Result<StreamScript, GatewayError>) {
        self.streams.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<ChannelSnapshot, GatewayError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    pub fn push_transcript(&self, result: Result<Vec<RemoteMessage>, GatewayError>) {
        self.transcripts.lock().unwrap().push_back(result);
    }

    pub fn push_delete(&self, result: Result<(), GatewayError>) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub fn push_cancel(&self, result: Result<(), GatewayError>) {
        self.cancel_results.lock().unwrap().push_back(result);
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn exhausted(endpoint: &str) -> GatewayError {
        GatewayError::ConnectionError(format!("mock: no scripted response for {endpoint}"))
    }

    // ------------------------------------------------------------------
    // Fixture helpers
    // ------------------------------------------------------------------

    pub fn remote_chat(id: &str, name: Option<&str>) -> RemoteChat {
        RemoteChat {
            id: ChatId::new(id),
            name: name.map(String::from),
            default_model: "gpt-4.1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn remote_user(chat: &ChatId, content: &str) -> RemoteMessage {
        RemoteMessage {
            id: format!("u-{content}"),
            chat_id: chat.clone(),
            role: Role::User,
            model: "user".into(),
            content: content.into(),
            generation_mode: GenerationMode::Direct,
            channel_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn remote_consensus_answer(chat: &ChatId, content: &str) -> RemoteMessage {
        RemoteMessage {
            id: format!("a-{content}"),
            chat_id: chat.clone(),
            role: Role::Assistant,
            model: "consensus".into(),
            content: content.into(),
            generation_mode: GenerationMode::Consensus,
            channel_id: Some(ChannelId::new("ch")),
            created_at: Utc::now(),
        }
    }

    pub fn consensus_placeholder_reply(chat: &ChatId, channel: &str) -> RemoteMessage {
        RemoteMessage {
            id: "placeholder".into(),
            chat_id: chat.clone(),
            role: Role::Assistant,
            model: "consensus".into(),
            content: String::new(),
            generation_mode: GenerationMode::Consensus,
            channel_id: Some(ChannelId::new(channel)),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl BackendGateway for MockGateway {
    async fn create_chat(
        &self,
        _name: Option<&str>,
        _default_model: &str,
    ) -> Result<RemoteChat, GatewayError> {
        // Suspend once so tests can interleave with the round-trip.
        tokio::task::yield_now().await;
        self.creates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("create_chat")))
    }

    async fn list_chats(&self) -> Result<Vec<RemoteChat>, GatewayError> {
        self.chat_lists
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("list_chats")))
    }

    async fn fetch_chat(&self, _chat: &ChatId) -> Result<RemoteChatDetail, GatewayError> {
        self.chat_details
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("fetch_chat")))
    }

    async fn delete_chat(&self, _chat: &ChatId) -> Result<(), GatewayError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.deletes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn send_message(
        &self,
        _chat: &ChatId,
        _request: &SendMessageRequest,
    ) -> Result<RemoteMessage, GatewayError> {
        self.sends
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("send_message")))
    }

    async fn stream_message(
        &self,
        _chat: &ChatId,
        _request: &SendMessageRequest,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, GatewayError> {
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("stream_message")))?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for event in script.events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if script.hold_open {
                cancel.cancelled().await;
            }
        });
        Ok(StreamHandle::new(rx))
    }

    async fn list_messages(&self, _chat: &ChatId) -> Result<Vec<RemoteMessage>, GatewayError> {
        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("list_messages")))
    }

    async fn channel_status(
        &self,
        _channel: &ChannelId,
    ) -> Result<ChannelSnapshot, GatewayError> {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("channel_status")))
    }

    async fn cancel_generation(&self, _chat: &ChatId) -> Result<(), GatewayError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancel_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn list_profiles(&self) -> Result<Vec<ConsensusProfile>, GatewayError> {
        Ok(Vec::new())
    }
}
