use serde::{Deserialize, Serialize};

use crate::models::{Attachment, ChannelId, GuildId, MessageId, RelayedMessage, UserId};

/// Events delivered by the gateway bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// The bot joined a guild, or a guild came back after an outage
    GuildAvailable { guild_id: GuildId },

    /// The bot left a guild
    GuildRemoved { guild_id: GuildId },

    /// A channel was deleted
    ChannelDelete {
        guild_id: GuildId,
        channel_id: ChannelId,
    },

    /// A message was posted
    MessageCreate(MessageEvent),
}

impl GatewayEvent {
    /// Returns the guild this event is scoped to, if any.
    /// Direct messages have no guild and are ignored by the relay.
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Self::GuildAvailable { guild_id } => Some(*guild_id),
            Self::GuildRemoved { guild_id } => Some(*guild_id),
            Self::ChannelDelete { guild_id, .. } => Some(*guild_id),
            Self::MessageCreate(message) => message.guild_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: UserId,
    /// Display name as shown in the guild.
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: MessageId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author: MessageAuthor,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MessageEvent {
    pub fn jump_url(&self) -> String {
        let guild = self
            .guild_id
            .map(|g| g.to_string())
            .unwrap_or_else(|| "@me".into());
        format!(
            "https://discord.com/channels/{}/{}/{}",
            guild, self.channel_id, self.id
        )
    }

    pub fn to_relayed(&self) -> RelayedMessage {
        RelayedMessage {
            content: self.content.clone(),
            attachments: self.attachments.clone(),
            author_name: self.author.name.clone(),
            author_avatar: self.author.avatar_url.clone(),
            source_channel: self.channel_id,
            jump_url: self.jump_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_create_parses_from_bridge_json() {
        let json = r#"{
            "type": "MessageCreate",
            "data": {
                "id": 900,
                "guild_id": 1,
                "channel_id": 20,
                "author": { "id": 5, "name": "hattyot" },
                "content": "hi"
            }
        }"#;

        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.guild_id(), Some(GuildId(1)));

        let GatewayEvent::MessageCreate(message) = event else {
            panic!("expected MessageCreate");
        };
        assert!(message.attachments.is_empty());
        assert_eq!(message.author.avatar_url, None);
        assert_eq!(message.jump_url(), "https://discord.com/channels/1/20/900");
    }
}
