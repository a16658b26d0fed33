//! Authorization credential sources
//!
//! The client does not manage credential lifecycle; it only attaches the
//! bearer token supplied by one of these sources to every request. Token
//! acquisition and refresh live outside this crate.

/// Supplies the bearer token attached to backend requests.
pub trait AuthTokenSource: Send + Sync {
    /// The current token, or `None` for unauthenticated requests.
    fn token(&self) -> Option<String>;
}

/// A fixed token, typically read from configuration.
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// No credential at all.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl AuthTokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token from an environment variable on every request, so an
/// externally refreshed credential is picked up without a restart.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl AuthTokenSource for EnvToken {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|t| !t.is_empty())
    }
}
