//! Consensus domain: observed channels and run configuration

pub mod channel;
pub mod setup;
