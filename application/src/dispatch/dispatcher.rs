//! Message dispatch controller
//!
//! Orchestrates one send operation end to end: optimistic insert, request
//! issuance, result integration, rollback on setup failure. This is the
//! only component that acquires the generation slot or creates a
//! generation handle, and the slot is held through an RAII guard so it is
//! released exactly once on every exit path: normal completion, error
//! and cancellation alike.
//!
//! Ordering guarantee per session: user append → placeholder append →
//! content replacements in chunk-arrival order → final replace-or-merge.

use crate::dispatch::generation::{GenerationCoordinator, GenerationGuard};
use crate::dispatch::poller::{ChannelPoller, DEFAULT_POLL_INTERVAL};
use crate::dispatch::stream_consumer::consume_stream;
use crate::ports::backend::{BackendGateway, GatewayError, SendMessageRequest};
use crate::store::session_store::SessionStore;
use parley_domain::{
    ChatId, ConsensusProfile, ConsensusSetup, DomainError, GenerationKind, Message, MessageId,
    SendOutcome, Session,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Longest derived session title, in characters.
const MAX_TITLE_CHARS: usize = 60;

/// How a send should be generated.
#[derive(Debug, Clone)]
pub enum SendMode {
    /// Single-model streaming response.
    Direct,
    /// Multi-model consensus, resolved by polling.
    Consensus(ConsensusSetup),
}

/// Errors surfaced by the dispatch controller
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("A generation is already in progress")]
    Busy,

    #[error("No model configured")]
    NoModelConfigured,

    #[error("Session owns the active generation: {0}")]
    SessionBusy(ChatId),

    #[error(transparent)]
    Store(#[from] DomainError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Drives sends, cancellation and session lifecycle against the backend.
pub struct Dispatcher<G: BackendGateway + 'static> {
    gateway: Arc<G>,
    store: Arc<SessionStore>,
    coordinator: Arc<GenerationCoordinator>,
    default_model: Option<String>,
    poll_interval: Duration,
}

impl<G: BackendGateway + 'static> Dispatcher<G> {
    pub fn new(
        gateway: Arc<G>,
        store: Arc<SessionStore>,
        coordinator: Arc<GenerationCoordinator>,
    ) -> Self {
        Self {
            gateway,
            store,
            coordinator,
            default_model: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Model used when creating sessions and tagging sends.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn is_busy(&self) -> bool {
        self.coordinator.is_busy()
    }

    // ------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------

    /// Send a message in the active session (creating one on the server
    /// first if none is selected) and drive generation to its terminal
    /// state.
    pub async fn send(&self, content: &str, mode: SendMode) -> Result<SendOutcome, DispatchError> {
        if self.coordinator.is_busy() {
            return Err(DispatchError::Busy);
        }

        // Step 1: determine the target session, creating it synchronously
        // when none is selected. Creation failure aborts the whole send;
        // no optimistic message is left dangling.
        let (session_id, model, created_here) = match self.store.active_session() {
            Some(session) => {
                let model = self
                    .default_model
                    .clone()
                    .unwrap_or_else(|| session.default_model.clone());
                (session.id, model, false)
            }
            None => {
                let model = self
                    .default_model
                    .clone()
                    .ok_or(DispatchError::NoModelConfigured)?;
                let id = self.create_session(content, &model).await?;
                (id, model, true)
            }
        };

        // Step 2: optimistic user append with a local timestamp.
        let user_id = self.store.append_message(&session_id, |id| {
            Message::user(id, content, Some(model.clone()))
        })?;

        // Step 3: acquire the global generation slot. A send that slipped
        // in during session creation wins; ours rolls back.
        let kind = match &mode {
            SendMode::Direct => GenerationKind::Stream,
            SendMode::Consensus(_) => GenerationKind::ConsensusPoll,
        };
        let Some(guard) = self.coordinator.try_begin(session_id.clone(), kind) else {
            let _ = self
                .store
                .remove_messages_matching(&session_id, |m| m.id == user_id);
            if created_here {
                // The session from step 1 never carried a message; drop it
                // locally and on the server rather than leaving an empty
                // orphan behind.
                let _ = self.store.delete_session(&session_id);
                if let Err(e) = self.gateway.delete_chat(&session_id).await {
                    warn!(session = %session_id, error = %e, "cleanup of unused session failed");
                }
            }
            return Err(DispatchError::Busy);
        };

        info!(session = %session_id, ?kind, "dispatching send");

        // Step 4: branch on mode. The guard travels into the branch and
        // releases the slot when the branch returns, whatever the path.
        match mode {
            SendMode::Direct => {
                self.run_direct(&session_id, content, &model, user_id, guard)
                    .await
            }
            SendMode::Consensus(setup) => {
                self.run_consensus(&session_id, content, setup, guard).await
            }
        }
    }

    /// Direct mode: open the stream first, then commit the placeholder.
    /// An open failure therefore rolls the user message back, leaving the
    /// transcript exactly as before the send.
    async fn run_direct(
        &self,
        session: &ChatId,
        content: &str,
        model: &str,
        user_id: MessageId,
        guard: GenerationGuard,
    ) -> Result<SendOutcome, DispatchError> {
        let request = SendMessageRequest::direct(content, Some(model.to_string()));
        let handle = match self
            .gateway
            .stream_message(session, &request, guard.token())
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self
                    .store
                    .remove_messages_matching(session, |m| m.id == user_id);
                return Err(e.into());
            }
        };

        let placeholder = self
            .store
            .append_message(session, |id| Message::stream_placeholder(id, model))?;

        let outcome = consume_stream(&self.store, session, placeholder, handle, &guard.token()).await;
        drop(guard);
        Ok(outcome)
    }

    /// Consensus mode: the placeholder is committed up front, then the
    /// initiating send returns the channel reference that gets recorded
    /// on it. Failures after that point mark the placeholder failed; the
    /// row persists for auditability.
    async fn run_consensus(
        &self,
        session: &ChatId,
        content: &str,
        setup: ConsensusSetup,
        guard: GenerationGuard,
    ) -> Result<SendOutcome, DispatchError> {
        let placeholder = self
            .store
            .append_message(session, |id| Message::consensus_placeholder(id))?;

        let request = SendMessageRequest::consensus(content, &setup);
        let reply = match self.gateway.send_message(session, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                let reason = e.to_string();
                let failure = format!("Consensus failed: {reason}");
                let _ = self
                    .store
                    .update_message(session, placeholder, |m| m.mark_failed(failure));
                return Ok(SendOutcome::Failed(reason));
            }
        };

        let Some(channel) = reply.channel_id else {
            let reason = "server returned no consensus channel".to_string();
            let failure = format!("Consensus failed: {reason}");
            let _ = self
                .store
                .update_message(session, placeholder, |m| m.mark_failed(failure));
            return Ok(SendOutcome::Failed(reason));
        };

        let recorded = channel.clone();
        self.store
            .update_message(session, placeholder, |m| m.channel_id = Some(recorded))?;

        let poller = ChannelPoller::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.store),
            self.poll_interval,
        );
        let outcome = poller.run(session, &channel, placeholder, guard.token()).await;
        drop(guard);
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Cancel the active generation, if any.
    ///
    /// Local cleanup (token fired, slot cleared) happens before and
    /// regardless of the best-effort backend notification; a notify
    /// failure is logged and swallowed. Calling this when idle is a
    /// no-op. Already-applied partial content is never rolled back.
    pub async fn cancel_active(&self) {
        let Some(active) = self.coordinator.cancel_local() else {
            debug!("cancel requested with no active generation");
            return;
        };
        info!(session = %active.session, "cancelled active generation");
        if let Err(e) = self.gateway.cancel_generation(&active.session).await {
            warn!(session = %active.session, error = %e, "backend cancel notification failed");
        }
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    async fn create_session(&self, content: &str, model: &str) -> Result<ChatId, DispatchError> {
        let title = derive_title(content);
        let chat = self.gateway.create_chat(Some(&title), model).await?;
        let id = chat.id.clone();
        self.store.insert_session(Session::from_remote(&chat));
        Ok(id)
    }

    /// Pull the server's chat list into the store.
    pub async fn load_sessions(&self) -> Result<(), DispatchError> {
        let chats = self.gateway.list_chats().await?;
        self.store.sync_remote_chats(&chats);
        Ok(())
    }

    /// Select a session and refresh it from the server. The store's merge
    /// guard protects any local optimistic content from the fetch.
    pub async fn open_session(&self, id: &ChatId) -> Result<(), DispatchError> {
        self.store.select(Some(id.clone()));
        let detail = self.gateway.fetch_chat(id).await?;
        self.store.merge_fetched_transcript(id, &detail)?;
        Ok(())
    }

    /// Delete a session on the server and locally.
    ///
    /// Deleting the session that owns the active generation is refused;
    /// cancel first, so deletion stays side-effect free.
    pub async fn delete_session(&self, id: &ChatId) -> Result<(), DispatchError> {
        if self.coordinator.active_session().as_ref() == Some(id) {
            return Err(DispatchError::SessionBusy(id.clone()));
        }
        self.gateway.delete_chat(id).await?;
        self.store.delete_session(id)?;
        Ok(())
    }

    /// Saved consensus profiles, for resolving a profile name to an id.
    pub async fn list_profiles(&self) -> Result<Vec<ConsensusProfile>, DispatchError> {
        Ok(self.gateway.list_profiles().await?)
    }
}

/// Derive a chat title from the first message.
fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    let mut title: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        title.push('…');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::event::StoreEvent;
    use crate::test_support::{MockGateway, StreamScript};
    use parley_domain::{
        ChannelSnapshot, ChannelStatus, MessageStatus, ProfileId, Role, CONSENSUS_PLACEHOLDER,
    };
    use tokio::time::{timeout, Duration as TokioDuration};

    fn dispatcher(gateway: Arc<MockGateway>) -> Arc<Dispatcher<MockGateway>> {
        let store = Arc::new(SessionStore::new());
        let coordinator = Arc::new(GenerationCoordinator::new());
        Arc::new(
            Dispatcher::new(gateway, store, coordinator)
                .with_default_model("gpt-4.1")
                .with_poll_interval(Duration::from_millis(10)),
        )
    }

    fn snapshot(status: ChannelStatus, answer: Option<&str>) -> ChannelSnapshot {
        ChannelSnapshot {
            id: None,
            status,
            rounds_executed: None,
            answer: answer.map(String::from),
            error: None,
        }
    }

    async fn wait_busy(dispatcher: &Dispatcher<MockGateway>) {
        timeout(TokioDuration::from_secs(5), async {
            while !dispatcher.is_busy() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("dispatcher never became busy");
    }

    #[tokio::test]
    async fn scenario_a_direct_send_on_fresh_session() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", Some("hello"))));
        gateway.push_stream(Ok(StreamScript::completed(&["Hi ", "there"])));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let outcome = dispatcher.send("hello", SendMode::Direct).await.unwrap();
        assert_eq!(outcome, SendOutcome::Completed("Hi there".into()));

        let session = dispatcher.store().active_session().unwrap();
        assert_eq!(session.id, ChatId::new("c1"));
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].content, "hello");
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert_eq!(session.messages[1].content, "Hi there");
        assert!(!session.messages[1].is_consensus);
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_b_consensus_send() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", Some("task"))));
        let chat = ChatId::new("c1");
        gateway.push_send(Ok(MockGateway::consensus_placeholder_reply(&chat, "ch-1")));
        gateway.push_status(Ok(snapshot(ChannelStatus::Running, None)));
        gateway.push_status(Ok(snapshot(ChannelStatus::Finished, Some("X"))));
        gateway.push_transcript(Ok(vec![
            MockGateway::remote_user(&chat, "task"),
            MockGateway::remote_consensus_answer(&chat, "X"),
        ]));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let setup = ConsensusSetup::Profile(ProfileId::new("p-1"));

        let send = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.send("task", SendMode::Consensus(setup)).await }
        });

        // The placeholder appears immediately, before polling resolves.
        wait_busy(&dispatcher).await;
        let mid_flight = dispatcher.store().session(&chat).unwrap();
        let placeholder = mid_flight.last_message().unwrap();
        assert!(placeholder.is_consensus);
        assert!(placeholder.content.starts_with(CONSENSUS_PLACEHOLDER));

        let outcome = send.await.unwrap().unwrap();
        assert_eq!(outcome, SendOutcome::Completed("X".into()));

        let session = dispatcher.store().session(&chat).unwrap();
        let answer = session.messages.last().unwrap();
        assert_eq!(answer.content, "X");
        assert!(answer.is_consensus);
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn scenario_c_second_send_rejected_while_busy() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));
        gateway.push_stream(Ok(StreamScript::held_open(&["thinking"])));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let first = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.send("first", SendMode::Direct).await }
        });
        wait_busy(&dispatcher).await;

        let before = dispatcher
            .store()
            .session(&ChatId::new("c1"))
            .unwrap()
            .messages
            .len();
        let rejected = dispatcher.send("second", SendMode::Direct).await;
        assert!(matches!(rejected, Err(DispatchError::Busy)));
        let after = dispatcher
            .store()
            .session(&ChatId::new("c1"))
            .unwrap()
            .messages
            .len();
        assert_eq!(before, after);

        dispatcher.cancel_active().await;
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn scenario_d_cancel_mid_stream_then_resend() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));
        gateway.push_stream(Ok(StreamScript::held_open(&["partial answer"])));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let chat = ChatId::new("c1");

        let send = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.send("question", SendMode::Direct).await }
        });
        wait_busy(&dispatcher).await;

        // Wait for the delta to land before cancelling.
        let mut events = dispatcher.store().subscribe();
        let applied = timeout(TokioDuration::from_secs(5), async {
            loop {
                let session = dispatcher.store().session(&chat);
                if let Some(s) = session
                    && s.last_message().is_some_and(|m| m.content == "partial answer")
                {
                    break;
                }
                let _ = events.recv().await;
            }
        })
        .await;
        applied.expect("delta never applied");

        dispatcher.cancel_active().await;
        let outcome = send.await.unwrap().unwrap();
        assert!(outcome.is_cancelled());
        assert!(!dispatcher.is_busy());
        assert_eq!(gateway.cancel_calls(), 1);

        // Partial content intact
        let session = dispatcher.store().session(&chat).unwrap();
        assert_eq!(session.last_message().unwrap().content, "partial answer");

        // A subsequent send is accepted immediately.
        gateway.push_stream(Ok(StreamScript::completed(&["fresh"])));
        let outcome = dispatcher.send("again", SendMode::Direct).await.unwrap();
        assert_eq!(outcome, SendOutcome::Completed("fresh".into()));
    }

    #[tokio::test]
    async fn resend_after_cancel_keeps_earlier_rows_intact() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));
        gateway.push_stream(Ok(StreamScript::held_open(&["partial answer"])));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let chat = ChatId::new("c1");

        let first = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.send("question", SendMode::Direct).await }
        });
        wait_busy(&dispatcher).await;

        let mut events = dispatcher.store().subscribe();
        let applied = timeout(TokioDuration::from_secs(5), async {
            loop {
                let session = dispatcher.store().session(&chat);
                if let Some(s) = session
                    && s.last_message().is_some_and(|m| m.content == "partial answer")
                {
                    break;
                }
                let _ = events.recv().await;
            }
        })
        .await;
        applied.expect("delta never applied");

        dispatcher.cancel_active().await;

        // The next send is accepted before the cancelled consumer task
        // has woken up on its token; its rows must not be rewritten by
        // the dead stream's buffer.
        gateway.push_stream(Ok(StreamScript::completed(&["fresh"])));
        let outcome = dispatcher
            .send("second question", SendMode::Direct)
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Completed("fresh".into()));

        let first_outcome = first.await.unwrap().unwrap();
        assert!(first_outcome.is_cancelled());

        let session = dispatcher.store().session(&chat).unwrap();
        assert_eq!(session.messages.len(), 4);
        assert_eq!(session.messages[0].content, "question");
        assert_eq!(session.messages[1].content, "partial answer");
        assert_eq!(session.messages[1].status, MessageStatus::Complete);
        assert_eq!(session.messages[2].role, Role::User);
        assert_eq!(session.messages[2].content, "second question");
        assert_eq!(session.messages[3].content, "fresh");
    }

    #[tokio::test]
    async fn losing_slot_race_after_session_creation_cleans_up() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));

        let store = Arc::new(SessionStore::new());
        let coordinator = Arc::new(GenerationCoordinator::new());
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&gateway), Arc::clone(&store), Arc::clone(&coordinator))
                .with_default_model("gpt-4.1"),
        );

        let send = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.send("hello", SendMode::Direct).await }
        });
        // Let the send suspend inside the session-creation round-trip,
        // then grab the slot out from under it.
        tokio::task::yield_now().await;
        let guard = coordinator
            .try_begin(ChatId::new("other"), GenerationKind::Stream)
            .unwrap();

        let result = send.await.unwrap();
        assert!(matches!(result, Err(DispatchError::Busy)));

        // The freshly created session was rolled back locally and deleted
        // on the server; nothing empty is left selected.
        assert!(store.sessions().is_empty());
        assert_eq!(store.active_session_id(), None);
        assert_eq!(gateway.delete_calls(), 1);
        drop(guard);
    }

    #[tokio::test]
    async fn rollback_when_first_send_fails_after_session_creation() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));
        gateway.push_stream(Err(GatewayError::ConnectionError("refused".into())));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let result = dispatcher.send("hello", SendMode::Direct).await;
        assert!(matches!(result, Err(DispatchError::Gateway(_))));

        // The optimistic user message was removed; the session is empty.
        let session = dispatcher.store().session(&ChatId::new("c1")).unwrap();
        assert!(session.messages.is_empty());
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn session_creation_failure_leaves_no_session() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Err(GatewayError::RequestFailed("500".into())));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let result = dispatcher.send("hello", SendMode::Direct).await;
        assert!(matches!(result, Err(DispatchError::Gateway(_))));
        assert!(dispatcher.store().sessions().is_empty());
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn send_without_model_or_session_is_rejected() {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(SessionStore::new());
        let coordinator = Arc::new(GenerationCoordinator::new());
        let dispatcher = Dispatcher::new(gateway, store, coordinator);

        let result = dispatcher.send("hello", SendMode::Direct).await;
        assert!(matches!(result, Err(DispatchError::NoModelConfigured)));
    }

    #[tokio::test]
    async fn cancel_when_idle_is_noop_and_skips_backend() {
        let gateway = Arc::new(MockGateway::new());
        let dispatcher = dispatcher(Arc::clone(&gateway));
        dispatcher.cancel_active().await;
        dispatcher.cancel_active().await;
        assert_eq!(gateway.cancel_calls(), 0);
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn consensus_send_failure_marks_placeholder_failed() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));
        gateway.push_send(Err(GatewayError::RequestFailed("502".into())));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let setup = ConsensusSetup::explicit("g", vec!["a".into()]);
        let outcome = dispatcher
            .send("task", SendMode::Consensus(setup))
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::Failed(_)));

        let session = dispatcher.store().session(&ChatId::new("c1")).unwrap();
        // User message and failed placeholder both persist.
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].status, MessageStatus::Failed);
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn deleting_busy_session_is_refused() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));
        gateway.push_stream(Ok(StreamScript::held_open(&[])));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let send = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.send("q", SendMode::Direct).await }
        });
        wait_busy(&dispatcher).await;

        let chat = ChatId::new("c1");
        let result = dispatcher.delete_session(&chat).await;
        assert!(matches!(result, Err(DispatchError::SessionBusy(_))));
        assert!(dispatcher.store().session(&chat).is_some());

        dispatcher.cancel_active().await;
        let _ = send.await.unwrap();
        dispatcher.delete_session(&chat).await.unwrap();
        assert!(dispatcher.store().session(&chat).is_none());
    }

    #[tokio::test]
    async fn subscriber_observes_ordered_transitions() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_create(Ok(MockGateway::remote_chat("c1", None)));
        gateway.push_stream(Ok(StreamScript::completed(&["a", "b"])));

        let dispatcher = dispatcher(Arc::clone(&gateway));
        let mut events = dispatcher.store().subscribe();
        dispatcher.send("hi", SendMode::Direct).await.unwrap();

        let mut appended = 0;
        let mut updates = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                StoreEvent::MessageAppended { .. } => {
                    appended += 1;
                    // All appends precede the first in-place update.
                    assert_eq!(updates, 0, "append observed after an update");
                }
                StoreEvent::MessageUpdated { .. } => updates += 1,
                _ => {}
            }
        }
        assert_eq!(appended, 2);
        assert!(updates >= 2);
    }

    #[test]
    fn derive_title_truncates_long_content() {
        let long = "x".repeat(200);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS + 1);
        assert!(title.ends_with('…'));
        assert_eq!(derive_title("  short question  "), "short question");
    }
}
