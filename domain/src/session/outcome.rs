//! Terminal outcomes of a generation
//!
//! Cancellation is not a failure: a user-initiated abort is a clean
//! release, never an error to report. Modelling the three terminal states
//! as one tagged type lets callers match exhaustively instead of
//! inspecting error strings.

/// What kind of generation a handle is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    /// A direct streaming response.
    Stream,
    /// A consensus run observed by polling its channel.
    ConsensusPoll,
}

/// How a generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Normal completion; carries the final assistant content.
    Completed(String),
    /// The generation failed; partial content (if any) is left in place.
    Failed(String),
    /// The user cancelled; partial content is left as-is.
    Cancelled,
}

impl SendOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SendOutcome::Cancelled)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SendOutcome::Completed(_))
    }

    /// Final content for a completed generation, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            SendOutcome::Completed(s) => Some(s),
            _ => None,
        }
    }
}
