//! In-memory session store
//!
//! Single source of truth for what is rendered. All mutations are
//! synchronous function calls applied under one lock, so between
//! suspension points they are atomic with respect to all other
//! orchestration logic. Components never touch session fields directly;
//! they go through this API, and every mutation notifies subscribers.
//!
//! The merge rule protecting optimistic content (a fetched transcript
//! never clobbers non-empty local messages) lives here, in
//! [`SessionStore::merge_fetched_transcript`].

use crate::store::event::StoreEvent;
use parley_domain::{
    ChatId, DomainError, Message, MessageId, RemoteChat, RemoteChatDetail, RemoteMessage, Session,
};
use std::sync::Mutex;
use tokio::sync::mpsc;

struct StoreInner {
    /// Sessions, newest first. Locally created sessions are prepended.
    sessions: Vec<Session>,
    active: Option<ChatId>,
    next_message_id: u64,
    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl StoreInner {
    fn session_mut(&mut self, id: &ChatId) -> Result<&mut Session, DomainError> {
        self.sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| DomainError::SessionNotFound(id.clone()))
    }

    fn fresh_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id += 1;
        id
    }

    /// Replace a session's transcript with rows converted from the
    /// server representation, assigning fresh local ids.
    fn adopt_messages(
        &mut self,
        session: &ChatId,
        remote: &[RemoteMessage],
    ) -> Result<(), DomainError> {
        let mut messages = Vec::with_capacity(remote.len());
        for msg in remote {
            let id = self.fresh_message_id();
            messages.push(Message::from_remote(id, msg));
        }
        self.session_mut(session)?.messages = messages;
        Ok(())
    }

    fn notify(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// In-memory collection of sessions and their transcripts.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                sessions: Vec::new(),
                active: None,
                next_message_id: 1,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // Mutations never panic while holding the lock; a poisoned lock
        // would mean a bug in this module, so propagate the panic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to store change events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    // ------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------

    /// All sessions, newest first.
    pub fn sessions(&self) -> Vec<Session> {
        self.lock().sessions.clone()
    }

    pub fn session(&self, id: &ChatId) -> Option<Session> {
        self.lock().sessions.iter().find(|s| &s.id == id).cloned()
    }

    pub fn active_session_id(&self) -> Option<ChatId> {
        self.lock().active.clone()
    }

    pub fn active_session(&self) -> Option<Session> {
        let inner = self.lock();
        let id = inner.active.as_ref()?;
        inner.sessions.iter().find(|s| &s.id == id).cloned()
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Insert a newly created session at the front (it becomes the
    /// newest) and select it.
    pub fn insert_session(&self, session: Session) {
        let id = session.id.clone();
        let mut inner = self.lock();
        inner.sessions.insert(0, session);
        inner.active = Some(id.clone());
        inner.notify(StoreEvent::SessionInserted(id.clone()));
        inner.notify(StoreEvent::SessionSelected(Some(id)));
    }

    /// Select a session (or none). Selecting an unknown id is a no-op.
    pub fn select(&self, id: Option<ChatId>) {
        let mut inner = self.lock();
        if let Some(ref wanted) = id
            && !inner.sessions.iter().any(|s| &s.id == wanted)
        {
            return;
        }
        inner.active = id.clone();
        inner.notify(StoreEvent::SessionSelected(id));
    }

    /// Reconcile the local list with the server's chat list.
    ///
    /// Known sessions keep their local transcript; their metadata is
    /// refreshed only when no pending placeholder exists. Unknown chats
    /// are appended as empty shells in server order (newest first).
    pub fn sync_remote_chats(&self, remote: &[RemoteChat]) {
        let mut inner = self.lock();
        for chat in remote {
            match inner.sessions.iter_mut().find(|s| s.id == chat.id) {
                Some(local) => {
                    if !local.has_pending_placeholder() {
                        local.title = chat.name.clone();
                        local.last_updated = chat.updated_at;
                    }
                }
                None => inner.sessions.push(Session::from_remote(chat)),
            }
        }
        inner.notify(StoreEvent::SessionsRefreshed);
    }

    /// Remove a session. If it was active, the most-recently-updated
    /// remaining session becomes active (or none).
    pub fn delete_session(&self, id: &ChatId) -> Result<(), DomainError> {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| &s.id != id);
        if inner.sessions.len() == before {
            return Err(DomainError::SessionNotFound(id.clone()));
        }
        inner.notify(StoreEvent::SessionDeleted(id.clone()));
        if inner.active.as_ref() == Some(id) {
            let next = inner
                .sessions
                .iter()
                .max_by_key(|s| s.last_updated)
                .map(|s| s.id.clone());
            inner.active = next.clone();
            inner.notify(StoreEvent::SessionSelected(next));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transcript mutations
    // ------------------------------------------------------------------

    /// Append a message built from a store-assigned id.
    pub fn append_message(
        &self,
        session: &ChatId,
        build: impl FnOnce(MessageId) -> Message,
    ) -> Result<MessageId, DomainError> {
        let mut inner = self.lock();
        let id = inner.fresh_message_id();
        let target = inner.session_mut(session)?;
        target.messages.push(build(id));
        target.touch();
        inner.notify(StoreEvent::MessageAppended {
            session: session.clone(),
            message: id,
        });
        Ok(id)
    }

    /// Mutate one message in place, addressed by its store-assigned id.
    ///
    /// This is the content-replacement primitive used while streaming:
    /// the placeholder is replaced, never duplicated. Addressing by id
    /// means a writer that outlived its generation (a cancelled stream
    /// waking up late, a poller losing a race) can only ever touch its
    /// own row, never whatever happens to be trailing by then.
    pub fn update_message(
        &self,
        session: &ChatId,
        message: MessageId,
        update: impl FnOnce(&mut Message),
    ) -> Result<(), DomainError> {
        let mut inner = self.lock();
        let target = inner.session_mut(session)?;
        let row = target
            .messages
            .iter_mut()
            .find(|m| m.id == message)
            .ok_or(DomainError::MessageNotFound(message))?;
        update(row);
        target.touch();
        inner.notify(StoreEvent::MessageUpdated {
            session: session.clone(),
        });
        Ok(())
    }

    /// Remove all messages matching the predicate (rollback support).
    pub fn remove_messages_matching(
        &self,
        session: &ChatId,
        predicate: impl Fn(&Message) -> bool,
    ) -> Result<usize, DomainError> {
        let mut inner = self.lock();
        let target = inner.session_mut(session)?;
        let before = target.messages.len();
        target.messages.retain(|m| !predicate(m));
        let removed = before - target.messages.len();
        if removed > 0 {
            inner.notify(StoreEvent::MessagesRemoved {
                session: session.clone(),
                removed,
            });
        }
        Ok(removed)
    }

    /// Integrate a full chat fetched from the server.
    ///
    /// If the session already holds any messages locally, the fetched
    /// message list is discarded: a slower background fetch must never
    /// clobber optimistic or in-progress content. Metadata is refreshed
    /// only when no pending placeholder exists.
    pub fn merge_fetched_transcript(
        &self,
        session: &ChatId,
        fetched: &RemoteChatDetail,
    ) -> Result<(), DomainError> {
        let mut inner = self.lock();
        let local_empty = inner.session_mut(session)?.messages.is_empty();
        if local_empty {
            {
                let target = inner.session_mut(session)?;
                target.title = fetched.name.clone();
                target.last_updated = fetched.updated_at;
                target.channels = fetched.channels.clone();
            }
            inner.adopt_messages(session, &fetched.messages)?;
            inner.notify(StoreEvent::TranscriptReplaced {
                session: session.clone(),
            });
        } else {
            let target = inner.session_mut(session)?;
            if !target.has_pending_placeholder() {
                target.title = fetched.name.clone();
                target.last_updated = fetched.updated_at;
                target.channels = fetched.channels.clone();
            }
            inner.notify(StoreEvent::MetadataRefreshed {
                session: session.clone(),
            });
        }
        Ok(())
    }

    /// Replace the transcript with the authoritative server version.
    ///
    /// Only the consensus poller calls this, after the server reports the
    /// run finished, the one moment a full overwrite is safe.
    pub fn replace_transcript(
        &self,
        session: &ChatId,
        remote: &[RemoteMessage],
    ) -> Result<(), DomainError> {
        let mut inner = self.lock();
        inner.adopt_messages(session, remote)?;
        inner.session_mut(session)?.touch();
        inner.notify(StoreEvent::TranscriptReplaced {
            session: session.clone(),
        });
        Ok(())
    }
}
