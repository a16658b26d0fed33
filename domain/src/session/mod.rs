//! Session domain: transcripts, messages, streaming and outcomes

pub mod entities;
pub mod outcome;
pub mod remote;
pub mod stream;
