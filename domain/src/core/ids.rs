//! Identifier newtypes
//!
//! Server-assigned identifiers (chats, channels, profiles) are opaque
//! strings; the backend uses UUIDs but the client never inspects them.
//! [`MessageId`] is assigned locally by the session store so optimistic
//! messages can be addressed (and rolled back) before the server has
//! confirmed them.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Server-assigned identifier of a chat session.
    ChatId
);

string_id!(
    /// Server-assigned identifier of a consensus channel.
    ChannelId
);

string_id!(
    /// Server-assigned identifier of a saved consensus profile.
    ProfileId
);

/// Store-local identifier of a message row.
///
/// Remote message ids only exist once the server has persisted a row;
/// the store needs a stable handle earlier than that (for rollback of
/// optimistic inserts), so it numbers rows itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
