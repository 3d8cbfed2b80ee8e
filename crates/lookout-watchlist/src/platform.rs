use std::sync::Arc;

use async_trait::async_trait;
use lookout_types::models::{Attachment, FilterAlert};
use lookout_types::{ChannelId, GuildId, RoleId};

use crate::error::PlatformError;

/// Permission bits, as the platform encodes them.
pub mod permissions {
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    pub const SEND_MESSAGES: u64 = 1 << 11;
    pub const MANAGE_MESSAGES: u64 = 1 << 13;
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
    /// The guild's default role, which every member holds.
    Everyone,
    Role(RoleId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub allow: u64,
    pub deny: u64,
}

/// Channel and category primitives.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Look up a category by exact name.
    async fn find_category(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<ChannelId>, PlatformError>;

    async fn create_category(
        &self,
        guild_id: GuildId,
        name: &str,
        overwrites: &[PermissionOverwrite],
    ) -> Result<ChannelId, PlatformError>;

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        name: &str,
    ) -> Result<ChannelId, PlatformError>;

    /// Fails with [`PlatformError::UnknownChannel`] if the channel is already gone.
    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError>;
}

/// Which roles count as moderation staff in a guild.
#[async_trait]
pub trait ModeratorDirectory: Send + Sync {
    async fn moderator_roles(&self, guild_id: GuildId) -> Result<Vec<RoleId>, PlatformError>;
}

/// The one place where a message is posted under someone else's name and avatar.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Post `content` and copies of `attachments` into `channel_id`, presented
    /// as `display_name`. Fails with [`PlatformError::UnknownChannel`] when the
    /// channel no longer exists.
    async fn forward(
        &self,
        channel_id: ChannelId,
        display_name: &str,
        avatar_url: Option<&str>,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), PlatformError>;

    /// Longest `content` a single forward accepts, in chars.
    fn max_content_chars(&self) -> usize {
        usize::MAX
    }
}

/// Notifies moderators that a filter matched.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, alert: &FilterAlert) -> Result<(), PlatformError>;
}

/// Every capability the watchlist needs from the platform.
#[derive(Clone)]
pub struct Platform {
    pub channels: Arc<dyn ChannelApi>,
    pub moderators: Arc<dyn ModeratorDirectory>,
    pub relay: Arc<dyn RelayTransport>,
    pub alerts: Arc<dyn AlertSink>,
}

impl Platform {
    /// Use one client for every capability.
    pub fn from_client<P>(client: Arc<P>) -> Self
    where
        P: ChannelApi + ModeratorDirectory + RelayTransport + AlertSink + 'static,
    {
        Self {
            channels: client.clone(),
            moderators: client.clone(),
            relay: client.clone(),
            alerts: client,
        }
    }
}
