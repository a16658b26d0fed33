//! Domain layer for parley
//!
//! This crate contains the core entities and value objects of the chat
//! client. It has no dependencies on transport or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Session
//!
//! A titled, ordered transcript of messages between the user and one or
//! more models. The trailing assistant *placeholder* message is the only
//! message that is ever mutated in place: it grows while a response is
//! streamed and is finalized (or marked failed) when generation ends.
//!
//! ## Consensus
//!
//! A send mode where several models collaborate asynchronously on the
//! server to produce one agreed answer. The client observes the run
//! through a server-owned *channel* resource and never mutates it.

pub mod consensus;
pub mod core;
pub mod session;

// Re-export commonly used types
pub use consensus::{
    channel::{ChannelSnapshot, ChannelStatus},
    setup::{ConsensusProfile, ConsensusSetup, DEFAULT_MAX_ROUNDS},
};
pub use core::{
    error::DomainError,
    ids::{ChannelId, ChatId, MessageId, ProfileId},
};
pub use session::{
    entities::{Message, MessageStatus, Role, Session, CONSENSUS_PLACEHOLDER},
    outcome::{GenerationKind, SendOutcome},
    remote::{GenerationMode, RemoteChat, RemoteChatDetail, RemoteMessage},
    stream::StreamEvent,
};
