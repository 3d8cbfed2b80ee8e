use serde::{Deserialize, Serialize};

use crate::models::{ChannelId, UserId, WatchlistEntry};

// -- Watchlist management --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: UserId,
    /// Used to name the audit channel.
    pub username: String,
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddFiltersRequest {
    pub filters: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchlistEntryResponse {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub filters: Vec<String>,
}

impl From<WatchlistEntry> for WatchlistEntryResponse {
    fn from(entry: WatchlistEntry) -> Self {
        Self {
            user_id: entry.user_id,
            channel_id: entry.channel_id,
            filters: entry.filters,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
