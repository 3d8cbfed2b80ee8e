use std::sync::Arc;

use lookout_types::ChannelId;
use lookout_types::events::MessageEvent;
use lookout_types::models::{Attachment, FilterAlert, RelayedMessage};
use tracing::{info, trace, warn};

use crate::cache::{WatchedUser, WatchlistCache};
use crate::error::{PlatformError, WatchlistError};
use crate::platform::{AlertSink, RelayTransport};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The author is not on the watchlist.
    NotWatched,
    /// The audit channel was gone; the entry has been removed.
    Evicted,
    Relayed { alerted: bool },
    /// Forwarding failed for good. Filters still ran.
    Failed { alerted: bool },
}

/// Mirrors watched users' messages and raises filter alerts.
pub struct RelayEngine {
    cache: Arc<WatchlistCache>,
    relay: Arc<dyn RelayTransport>,
    alerts: Arc<dyn AlertSink>,
    retry: RetryPolicy,
}

impl RelayEngine {
    pub fn new(
        cache: Arc<WatchlistCache>,
        relay: Arc<dyn RelayTransport>,
        alerts: Arc<dyn AlertSink>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            relay,
            alerts,
            retry,
        }
    }

    pub fn cache(&self) -> &Arc<WatchlistCache> {
        &self.cache
    }

    /// Process one inbound message. Callers must only invoke this once the
    /// cache is ready, and in delivery order for any one author.
    pub async fn handle_message(&self, event: &MessageEvent) -> RelayOutcome {
        let Some(guild_id) = event.guild_id else {
            return RelayOutcome::NotWatched;
        };
        let Some(watched) = self.cache.get(guild_id, event.author.id) else {
            return RelayOutcome::NotWatched;
        };
        let channel_id = watched.entry.channel_id;

        let forwarded = match self.forward(channel_id, &event.to_relayed()).await {
            Ok(()) => true,
            Err(WatchlistError::ChannelGone(_)) => {
                return match self
                    .cache
                    .evict_dead_channel(guild_id, event.author.id, channel_id)
                    .await
                {
                    Ok(true) => RelayOutcome::Evicted,
                    Ok(false) => RelayOutcome::NotWatched,
                    Err(e) => {
                        warn!("Failed to evict user {} from guild {}: {}", event.author.id, guild_id, e);
                        RelayOutcome::Failed { alerted: false }
                    }
                };
            }
            Err(e) => {
                warn!(
                    "Giving up relaying message {} from user {} in guild {}: {}",
                    event.id, event.author.id, guild_id, e
                );
                false
            }
        };

        let alerted = self.check_filters(&watched, event).await;

        if forwarded {
            RelayOutcome::Relayed { alerted }
        } else {
            RelayOutcome::Failed { alerted }
        }
    }

    /// Post the message, split into pieces the transport accepts. Each piece
    /// is retried on its own, so a retry never re-posts what already went
    /// through. Attachments travel with the first piece.
    async fn forward(
        &self,
        channel_id: ChannelId,
        message: &RelayedMessage,
    ) -> Result<(), WatchlistError> {
        let body = message.body();
        let chunks = split_content(&body, self.relay.max_content_chars());
        let relay = &self.relay;
        let name = message.author_name.as_str();
        let avatar = message.author_avatar.as_deref();
        let what = format!("Relay to {channel_id}");

        for (index, chunk) in chunks.iter().enumerate() {
            let chunk = chunk.as_str();
            let attachments: &[Attachment] = if index == 0 {
                &message.attachments
            } else {
                &[]
            };

            self.retry
                .run(&what, move || relay.forward(channel_id, name, avatar, chunk, attachments))
                .await
                .map_err(|e| match e {
                    PlatformError::UnknownChannel(id) => WatchlistError::ChannelGone(id),
                    other => other.into(),
                })?;
        }

        trace!("Relayed to {}: {}", channel_id, message.content);
        Ok(())
    }

    /// Returns whether a filter matched.
    async fn check_filters(&self, watched: &WatchedUser, event: &MessageEvent) -> bool {
        let Some(pattern) = watched.filters.first_match(&event.content) else {
            return false;
        };

        let alert = FilterAlert {
            guild_id: watched.entry.guild_id,
            user_id: watched.entry.user_id,
            author_name: event.author.name.clone(),
            channel_id: watched.entry.channel_id,
            pattern: pattern.to_string(),
            jump_url: event.jump_url(),
        };

        info!(
            "Filter `{}` matched for user {} in guild {}",
            alert.pattern, alert.user_id, alert.guild_id
        );
        if let Err(e) = self.alerts.alert(&alert).await {
            warn!("Failed to alert moderators in guild {}: {}", alert.guild_id, e);
        }
        true
    }
}

/// Split on char boundaries into pieces of at most `max_chars`. Always
/// yields at least one piece.
fn split_content(content: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut len = 0;
    for c in content.chars() {
        if len == max_chars {
            chunks.push(std::mem::take(&mut current));
            len = 0;
        }
        current.push(c);
        len += 1;
    }
    chunks.push(current);
    chunks
}
