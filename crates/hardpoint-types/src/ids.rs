//! Type-safe identifier wrappers.
//!
//! Chat-platform identifiers (users, guilds, channels) are opaque strings
//! handed to us by the chat collaborator. Wrapping them prevents passing a
//! channel id where a guild id is expected. Asynchronous operations get a
//! locally generated [`OperationId`] (UUID v7, time-ordered) so their log
//! lines can be correlated from start to completion.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around a platform-issued string identifier.
macro_rules! define_platform_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a raw platform identifier.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

define_platform_id! {
    /// Stable identity of a chat user (resolved from a member name).
    UserId
}

define_platform_id! {
    /// Identity of the guild (server) the session is bound to.
    GuildId
}

define_platform_id! {
    /// Identity of a text or voice channel within a guild.
    ChannelId
}

/// Correlation id for one two-phase asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for OperationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_ids_serialize_as_plain_strings() {
        let id = UserId::new("301155781531795456");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"301155781531795456\""));
    }

    #[test]
    fn operation_ids_are_unique() {
        let a = OperationId::new();
        let b = OperationId::new();
        assert_ne!(a, b);
        assert_ne!(a.0, Uuid::nil());
    }
}
