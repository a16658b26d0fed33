//! Generation slot and cancellation coordination
//!
//! At most one generation (stream or consensus poll) may be live across
//! all sessions. The slot is the global busy flag; it is acquired through
//! [`GenerationCoordinator::try_begin`] before any suspension point and
//! released exactly once on every exit path by the returned RAII
//! [`GenerationGuard`]. Forgetting a release branch is therefore
//! impossible by construction, the failure mode this design exists to
//! prevent.
//!
//! Each acquisition gets a monotonically increasing generation number, so
//! a guard that lost a race with `cancel_local` (which clears the slot
//! eagerly) cannot clear a successor's slot on drop.

use parley_domain::{ChatId, GenerationKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// The currently active generation, if any.
#[derive(Debug, Clone)]
pub struct ActiveGeneration {
    pub generation: u64,
    pub session: ChatId,
    pub kind: GenerationKind,
    pub token: CancellationToken,
}

/// Process-wide owner of the single generation slot.
#[derive(Debug, Default)]
pub struct GenerationCoordinator {
    slot: Mutex<Option<ActiveGeneration>>,
    counter: AtomicU64,
}

impl GenerationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveGeneration>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True while a generation is in flight.
    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }

    /// Session owning the active generation, if any.
    pub fn active_session(&self) -> Option<ChatId> {
        self.lock().as_ref().map(|g| g.session.clone())
    }

    /// Try to acquire the slot. Returns `None` if a generation is already
    /// active anywhere.
    pub fn try_begin(
        self: &Arc<Self>,
        session: ChatId,
        kind: GenerationKind,
    ) -> Option<GenerationGuard> {
        let mut slot = self.lock();
        if slot.is_some() {
            return None;
        }
        let generation = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        *slot = Some(ActiveGeneration {
            generation,
            session,
            kind,
            token: token.clone(),
        });
        Some(GenerationGuard {
            coordinator: Arc::clone(self),
            generation,
            token,
        })
    }

    /// Cancel the active generation locally: fire its token and clear the
    /// slot unconditionally. Returns the cleared entry so the caller can
    /// notify the backend. No-op when idle.
    pub fn cancel_local(&self) -> Option<ActiveGeneration> {
        let taken = self.lock().take()?;
        taken.token.cancel();
        Some(taken)
    }

    fn release(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|g| g.generation == generation) {
            *slot = None;
        }
    }
}

/// RAII handle for an acquired generation slot.
///
/// Dropping the guard releases the slot on normal completion, error
/// return, panic unwind or cancellation alike.
#[must_use = "dropping the guard releases the generation slot"]
pub struct GenerationGuard {
    coordinator: Arc<GenerationCoordinator>,
    generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    /// The cancellation token bound to this generation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.coordinator.release(self.generation);
    }
}
