//! Streaming consumer
//!
//! Reads decoded chunks from a [`StreamHandle`] one at a time and grows
//! the placeholder after each one, so displayed content is monotonic and
//! ordered by arrival. One suspension point per chunk; no two chunks are
//! ever processed concurrently. Every write is addressed to the
//! placeholder's id, so a consumer that wakes up after cancellation
//! cannot touch rows a follow-up send appended in the meantime.

use crate::ports::backend::StreamHandle;
use crate::store::session_store::SessionStore;
use parley_domain::{ChatId, MessageId, MessageStatus, SendOutcome, StreamEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drive a streaming response to its terminal state.
///
/// - Normal end of data finalizes the placeholder with the accumulated
///   text and yields `Completed`.
/// - A transport error keeps the partial content in place, marks the row
///   failed and yields `Failed`.
/// - Cancellation leaves the partial buffer as-is (finalized, no
///   rollback) and yields `Cancelled`.
pub(crate) async fn consume_stream(
    store: &SessionStore,
    session: &ChatId,
    placeholder: MessageId,
    mut handle: StreamHandle,
    cancel: &CancellationToken,
) -> SendOutcome {
    let mut buffer = String::new();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session = %session, "stream cancelled, keeping partial content");
                finalize(store, session, placeholder, &buffer);
                return SendOutcome::Cancelled;
            }
            event = handle.receiver.recv() => event,
        };

        match event {
            Some(StreamEvent::Delta(chunk)) => {
                buffer.push_str(&chunk);
                let snapshot = buffer.clone();
                if store
                    .update_message(session, placeholder, |m| m.content = snapshot)
                    .is_err()
                {
                    // Session or row vanished under us; nothing left to
                    // update.
                    warn!(session = %session, "placeholder disappeared mid-stream");
                    return SendOutcome::Failed("placeholder no longer exists".to_string());
                }
            }
            Some(StreamEvent::Completed(text)) => {
                let final_text = if buffer.is_empty() { text } else { buffer };
                finalize(store, session, placeholder, &final_text);
                return SendOutcome::Completed(final_text);
            }
            Some(StreamEvent::Error(reason)) => {
                warn!(session = %session, error = %reason, "transport failure mid-stream");
                let _ = store.update_message(session, placeholder, |m| {
                    // Partial content stays; only the status flips.
                    m.status = MessageStatus::Failed;
                    if m.content.is_empty() {
                        m.content = format!("Generation failed: {reason}");
                    }
                });
                return SendOutcome::Failed(reason);
            }
            None => {
                // Producer closed the channel without a terminal event:
                // end of data, unless the close was our own cancellation.
                if cancel.is_cancelled() {
                    finalize(store, session, placeholder, &buffer);
                    return SendOutcome::Cancelled;
                }
                finalize(store, session, placeholder, &buffer);
                return SendOutcome::Completed(buffer);
            }
        }
    }
}

fn finalize(store: &SessionStore, session: &ChatId, placeholder: MessageId, content: &str) {
    let owned = content.to_string();
    let _ = store.update_message(session, placeholder, |m| m.finalize(owned));
}
