//! Consensus poller
//!
//! After a consensus send returns its channel reference, the poller
//! queries channel status at a fixed interval until the server reports a
//! terminal state. Completion is recognized only by explicit status;
//! never by a timeout. The poll loop selects on the generation's
//! cancellation token every iteration, so user cancellation stops it
//! mid-flight; the busy slot itself is released by the caller's RAII
//! guard on every exit path.

use crate::ports::backend::BackendGateway;
use crate::store::session_store::SessionStore;
use parley_domain::{
    ChannelId, ChannelSnapshot, ChannelStatus, ChatId, MessageId, SendOutcome,
    CONSENSUS_PLACEHOLDER,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reference polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(4000);

/// Polls one consensus channel to completion.
pub struct ChannelPoller<G> {
    gateway: Arc<G>,
    store: Arc<SessionStore>,
    interval: Duration,
}

impl<G: BackendGateway> ChannelPoller<G> {
    pub fn new(gateway: Arc<G>, store: Arc<SessionStore>, interval: Duration) -> Self {
        Self {
            gateway,
            store,
            interval,
        }
    }

    /// Poll until the channel reaches a terminal status or the token
    /// fires. The first query happens immediately. All writes target the
    /// placeholder's id, never whatever row happens to be trailing.
    pub async fn run(
        &self,
        session: &ChatId,
        channel: &ChannelId,
        placeholder: MessageId,
        cancel: CancellationToken,
    ) -> SendOutcome {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(channel = %channel, "consensus poll cancelled");
                    return SendOutcome::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            let snapshot = match self.gateway.channel_status(channel).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // Transient status-query failures do not end the run;
                    // only a terminal status or the user does.
                    warn!(channel = %channel, error = %e, "channel status query failed");
                    continue;
                }
            };

            // Cancellation while the status query was in flight: the
            // result has not been integrated yet, so stop before touching
            // the store.
            if cancel.is_cancelled() {
                debug!(channel = %channel, "consensus poll cancelled");
                return SendOutcome::Cancelled;
            }

            match snapshot.status {
                ChannelStatus::Pending | ChannelStatus::Running => {
                    self.refresh_round_display(session, placeholder, &snapshot);
                }
                ChannelStatus::Finished => {
                    return self.integrate_final(session, placeholder, &snapshot).await;
                }
                ChannelStatus::Error => {
                    let reason = snapshot.error_text();
                    warn!(channel = %channel, error = %reason, "consensus run failed");
                    let failure = format!("Consensus failed: {reason}");
                    let _ = self
                        .store
                        .update_message(session, placeholder, |m| m.mark_failed(failure));
                    return SendOutcome::Failed(reason);
                }
            }
        }
    }

    /// Non-terminal tick: only the round-count display data changes.
    fn refresh_round_display(
        &self,
        session: &ChatId,
        placeholder: MessageId,
        snapshot: &ChannelSnapshot,
    ) {
        if let Some(rounds) = snapshot.rounds_executed
            && rounds > 0
        {
            let text = format!("{CONSENSUS_PLACEHOLDER} (round {rounds})");
            let _ = self.store.update_message(session, placeholder, |m| {
                if m.is_pending() {
                    m.content = text;
                }
            });
        }
    }

    /// Terminal `finished`: the generation is complete, so the server
    /// transcript is authoritative and may fully overwrite local state.
    /// If the transcript fetch fails, fall back to the inline answer.
    async fn integrate_final(
        &self,
        session: &ChatId,
        placeholder: MessageId,
        snapshot: &ChannelSnapshot,
    ) -> SendOutcome {
        let answer = snapshot.answer.clone().unwrap_or_default();
        match self.gateway.list_messages(session).await {
            Ok(messages) => {
                let _ = self.store.replace_transcript(session, &messages);
            }
            Err(e) => {
                warn!(session = %session, error = %e, "final transcript fetch failed, using inline answer");
                let inline = answer.clone();
                let _ = self
                    .store
                    .update_message(session, placeholder, |m| m.finalize(inline));
            }
        }
        SendOutcome::Completed(answer)
    }
}
