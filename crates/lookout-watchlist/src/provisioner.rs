use std::sync::Arc;

use lookout_types::{ChannelId, GuildId, RoleId};
use tracing::{debug, info, warn};

use crate::error::PlatformError;
use crate::locks::KeyedLocks;
use crate::platform::{
    ChannelApi, ModeratorDirectory, OverwriteTarget, PermissionOverwrite, permissions,
};
use crate::retry::RetryPolicy;

pub const CATEGORY_NAME: &str = "Watchlist";

/// Platform limit on channel name length.
const MAX_CHANNEL_NAME: usize = 100;

/// Creates the per-guild watchlist category and the per-user audit channels.
pub struct ChannelProvisioner {
    channels: Arc<dyn ChannelApi>,
    moderators: Arc<dyn ModeratorDirectory>,
    /// Serializes category creation per guild.
    category_locks: KeyedLocks<GuildId>,
    retry: RetryPolicy,
}

impl ChannelProvisioner {
    pub fn new(channels: Arc<dyn ChannelApi>, moderators: Arc<dyn ModeratorDirectory>) -> Self {
        Self {
            channels,
            moderators,
            category_locks: KeyedLocks::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Retry policy for transient failures of channel mutations.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Return the guild's watchlist category, creating it on first use.
    ///
    /// Visibility is decided here once: roles that can manage messages may
    /// read and write, everyone else is locked out. Roles that gain or lose
    /// that permission later are not reflected.
    pub async fn ensure_category(&self, guild_id: GuildId) -> Result<ChannelId, PlatformError> {
        let _guard = self.category_locks.lock(guild_id).await;
        // A retry looks the category up again, so a create that went through
        // despite the error is reused.
        self.retry
            .run("Watchlist category setup", move || self.find_or_create_category(guild_id))
            .await
    }

    async fn find_or_create_category(&self, guild_id: GuildId) -> Result<ChannelId, PlatformError> {
        if let Some(category) = self.channels.find_category(guild_id, CATEGORY_NAME).await? {
            debug!("Reusing watchlist category {} in guild {}", category, guild_id);
            return Ok(category);
        }

        let roles = self.moderators.moderator_roles(guild_id).await?;
        let overwrites = category_overwrites(&roles);
        let category = self
            .channels
            .create_category(guild_id, CATEGORY_NAME, &overwrites)
            .await?;

        info!(
            "Created watchlist category {} in guild {} ({} staff roles)",
            category,
            guild_id,
            roles.len()
        );
        Ok(category)
    }

    pub async fn create_user_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        display_name: &str,
    ) -> Result<ChannelId, PlatformError> {
        let name = channel_name(display_name);
        let channels = &self.channels;
        let channel_name = name.as_str();
        let channel = self
            .retry
            .run("Audit channel creation", move || {
                channels.create_text_channel(guild_id, category_id, channel_name)
            })
            .await?;
        info!("Created audit channel #{} ({}) in guild {}", name, channel, guild_id);
        Ok(channel)
    }

    /// A channel that is already gone counts as deleted.
    pub async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        let channels = &self.channels;
        let deleted = self
            .retry
            .run("Audit channel deletion", move || channels.delete_channel(channel_id))
            .await;
        match deleted {
            Ok(()) => Ok(()),
            Err(PlatformError::UnknownChannel(_)) => {
                warn!("Audit channel {} was already deleted", channel_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Staff roles may view, write and read history; the default role may not view.
pub fn category_overwrites(staff_roles: &[RoleId]) -> Vec<PermissionOverwrite> {
    let staff = permissions::VIEW_CHANNEL
        | permissions::SEND_MESSAGES
        | permissions::READ_MESSAGE_HISTORY;

    let mut overwrites: Vec<PermissionOverwrite> = staff_roles
        .iter()
        .map(|role| PermissionOverwrite {
            target: OverwriteTarget::Role(*role),
            allow: staff,
            deny: 0,
        })
        .collect();

    overwrites.push(PermissionOverwrite {
        target: OverwriteTarget::Everyone,
        allow: 0,
        deny: permissions::VIEW_CHANNEL,
    });

    overwrites
}

/// Channel name derived from a display name: lowercase, spaces and symbols
/// collapsed to single dashes.
pub fn channel_name(display_name: &str) -> String {
    let mut name = String::with_capacity(display_name.len());
    for c in display_name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            name.push(c);
        } else if !name.ends_with('-') {
            name.push('-');
        }
    }

    let name: String = name.trim_matches('-').chars().take(MAX_CHANNEL_NAME).collect();
    if name.is_empty() {
        "watched-user".to_string()
    } else {
        name
    }
}
