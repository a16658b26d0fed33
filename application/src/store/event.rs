//! Store change notifications
//!
//! Every mutation of the [`SessionStore`](super::session_store::SessionStore)
//! emits exactly one event after the change has been applied, so
//! subscribers (the REPL, a future UI) always observe state at least as
//! new as the event that woke them.

use parley_domain::{ChatId, MessageId};

/// A change applied to the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SessionInserted(ChatId),
    SessionDeleted(ChatId),
    SessionSelected(Option<ChatId>),
    SessionsRefreshed,
    MessageAppended { session: ChatId, message: MessageId },
    /// The trailing message was replaced in place (streaming growth,
    /// finalization or failure marking).
    MessageUpdated { session: ChatId },
    MessagesRemoved { session: ChatId, removed: usize },
    TranscriptReplaced { session: ChatId },
    MetadataRefreshed { session: ChatId },
}
