//! HTTP adapter for the backend gateway port

pub mod auth;
pub mod client;
pub mod decode;
