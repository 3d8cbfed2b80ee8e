//! JSON shapes exchanged with the REST API. Snowflakes travel as strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use lookout_types::GuildId;
use lookout_watchlist::platform::{OverwriteTarget, PermissionOverwrite};

pub const CHANNEL_TYPE_TEXT: u8 = 0;
pub const CHANNEL_TYPE_CATEGORY: u8 = 4;

/// JSON error codes
pub const UNKNOWN_CHANNEL: u64 = 10003;
pub const UNKNOWN_WEBHOOK: u64 = 10015;

pub fn de_snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Number(n) => Ok(n),
    }
}

pub fn ser_snowflake<S>(id: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&id.to_string())
}

#[derive(Debug, Deserialize)]
pub struct ChannelObject {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleObject {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: u64,
    /// Permission bit set, serialized as a decimal string.
    pub permissions: String,
}

#[derive(Debug, Deserialize)]
pub struct GuildObject {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Only present for webhooks this application can execute.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageObject {
    #[serde(deserialize_with = "de_snowflake")]
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct OverwriteObject {
    #[serde(serialize_with = "ser_snowflake")]
    pub id: u64,
    /// 0 = role, 1 = member
    #[serde(rename = "type")]
    pub kind: u8,
    pub allow: String,
    pub deny: String,
}

impl OverwriteObject {
    /// The default role shares its id with the guild.
    pub fn from_overwrite(guild_id: GuildId, overwrite: &PermissionOverwrite) -> Self {
        let id = match overwrite.target {
            OverwriteTarget::Everyone => guild_id.0,
            OverwriteTarget::Role(role) => role.0,
        };
        Self {
            id,
            kind: 0,
            allow: overwrite.allow.to_string(),
            deny: overwrite.deny.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateChannel<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permission_overwrites: Vec<OverwriteObject>,
}

#[derive(Debug, Serialize)]
pub struct CreateWebhook<'a> {
    pub name: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentSlot {
    pub id: usize,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub content: &'a str,
    pub username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<&'a str>,
    pub allowed_mentions: AllowedMentions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentSlot>,
}

#[derive(Debug, Serialize)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
    pub allowed_mentions: AllowedMentions,
}
