//! Infrastructure layer for parley
//!
//! Adapters for the outside world: the reqwest implementation of the
//! backend gateway port and the figment-based configuration loader.

pub mod config;
pub mod http;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigValidationError, FileConfig};
pub use http::{
    auth::{AuthTokenSource, EnvToken, StaticToken},
    client::HttpBackendGateway,
};
