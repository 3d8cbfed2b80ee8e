use lookout_types::{ChannelId, GuildId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("user {user_id} is already on the watchlist")]
    AlreadyWatched { guild_id: GuildId, user_id: UserId },

    #[error("user {user_id} is not on the watchlist")]
    NotWatched { guild_id: GuildId, user_id: UserId },

    #[error("invalid filter `{pattern}`: {reason}")]
    BadFilter { pattern: String, reason: String },

    #[error("store already holds an entry for user {user_id} in guild {guild_id}")]
    DuplicateEntry { guild_id: GuildId, user_id: UserId },

    #[error("audit channel {0} no longer exists")]
    ChannelGone(ChannelId),

    #[error("watchlist is still loading")]
    NotReady,

    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Failures reported by the chat platform.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("platform rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl PlatformError {
    /// Whether retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UnknownChannel(_) => false,
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
