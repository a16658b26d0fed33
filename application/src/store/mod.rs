//! Session store: the single writer for all transcript state

pub mod event;
pub mod session_store;
