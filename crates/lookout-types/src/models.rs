use std::fmt;

use serde::{Deserialize, Serialize};

/// Declares a platform snowflake id. Serialized as a plain integer.
macro_rules! snowflake {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<u64> for $name {
                fn from(id: u64) -> Self {
                    Self(id)
                }
            }

            impl std::str::FromStr for $name {
                type Err = std::num::ParseIntError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    s.parse().map(Self)
                }
            }
        )+
    };
}

snowflake!(
    /// A tenant community.
    GuildId,
    UserId,
    /// A text channel or a category (categories are channels on the platform).
    ChannelId,
    MessageId,
    RoleId,
);

/// The record binding a watched user to their filters and private audit channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub guild_id: GuildId,
    pub user_id: UserId,
    /// Regex patterns, in display order.
    pub filters: Vec<String>,
    pub channel_id: ChannelId,
}

/// A file attached to an inbound message. Only the reference travels with the
/// event; the relay transport fetches the bytes when forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

/// A watched user's message as it will appear in the audit channel.
/// Lives for the duration of one relay.
#[derive(Debug, Clone)]
pub struct RelayedMessage {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub source_channel: ChannelId,
    pub jump_url: String,
}

impl RelayedMessage {
    /// Original text followed by a mention of the source channel and a permalink.
    pub fn body(&self) -> String {
        format!(
            "{}\n<#{}> [Link]({})",
            self.content, self.source_channel, self.jump_url
        )
    }
}

/// Raised when a watched user's message matches one of their filters.
#[derive(Debug, Clone)]
pub struct FilterAlert {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub author_name: String,
    /// The audit channel the alert is posted to.
    pub channel_id: ChannelId,
    pub pattern: String,
    pub jump_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_integers() {
        let json = serde_json::to_string(&GuildId(42)).unwrap();
        assert_eq!(json, "42");

        let id: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(id, UserId(7));
    }

    #[test]
    fn relayed_body_links_back_to_source() {
        let msg = RelayedMessage {
            content: "hello".into(),
            attachments: vec![],
            author_name: "someone".into(),
            author_avatar: None,
            source_channel: ChannelId(10),
            jump_url: "https://discord.com/channels/1/10/99".into(),
        };
        assert_eq!(
            msg.body(),
            "hello\n<#10> [Link](https://discord.com/channels/1/10/99)"
        );
    }
}
