//! Domain error types

use crate::core::ids::{ChatId, MessageId};
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Session not found: {0}")]
    SessionNotFound(ChatId),

    #[error("Session has no messages: {0}")]
    EmptyTranscript(ChatId),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
