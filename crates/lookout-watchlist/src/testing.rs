//! In-process stand-ins for the store and the chat platform.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lookout_types::models::{Attachment, FilterAlert, WatchlistEntry};
use lookout_types::{ChannelId, GuildId, RoleId, UserId};
use parking_lot::Mutex;

use crate::error::{PlatformError, WatchlistError};
use crate::platform::{
    AlertSink, ChannelApi, ModeratorDirectory, PermissionOverwrite, RelayTransport,
};
use crate::store::WatchlistStore;

#[derive(Debug, Clone)]
pub struct FakeChannel {
    pub guild_id: GuildId,
    pub name: String,
    pub parent: Option<ChannelId>,
    pub is_category: bool,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// A message that went through [`RelayTransport::forward`].
#[derive(Debug, Clone)]
pub struct Forwarded {
    pub channel_id: ChannelId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub content: String,
    pub attachments: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    channels: BTreeMap<ChannelId, FakeChannel>,
    roles: HashMap<GuildId, Vec<RoleId>>,
    forwards: Vec<Forwarded>,
    alerts: Vec<FilterAlert>,
    forward_attempts: usize,
    failing_forwards: usize,
    failing_forward_attempts: HashSet<usize>,
    forward_delays: HashMap<ChannelId, Duration>,
    max_content_chars: Option<usize>,
    channel_op_attempts: usize,
    failing_channel_ops: usize,
}

pub struct FakePlatform {
    state: Mutex<FakeState>,
    next_id: AtomicU64,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            next_id: AtomicU64::new(1000),
        }
    }

    pub fn set_moderator_roles(&self, guild_id: GuildId, roles: Vec<RoleId>) {
        self.state.lock().roles.insert(guild_id, roles);
    }

    /// Make the next `count` forwards fail with a transport error.
    pub fn fail_next_forwards(&self, count: usize) {
        self.state.lock().failing_forwards = count;
    }

    /// Make the `attempt`-th forward (counting from 1) fail with a transport error.
    pub fn fail_forward_attempt(&self, attempt: usize) {
        self.state.lock().failing_forward_attempts.insert(attempt);
    }

    pub fn set_max_content_chars(&self, max: usize) {
        self.state.lock().max_content_chars = Some(max);
    }

    /// Make the next `count` channel creations or deletions fail with a
    /// transient error.
    pub fn fail_next_channel_ops(&self, count: usize) {
        self.state.lock().failing_channel_ops = count;
    }

    /// Calls to create_category, create_text_channel and delete_channel.
    pub fn channel_op_attempts(&self) -> usize {
        self.state.lock().channel_op_attempts
    }

    /// Slow down every forward into `channel_id`.
    pub fn set_forward_delay(&self, channel_id: ChannelId, delay: Duration) {
        self.state.lock().forward_delays.insert(channel_id, delay);
    }

    /// Delete a channel behind the bot's back.
    pub fn delete_out_of_band(&self, channel_id: ChannelId) {
        self.state.lock().channels.remove(&channel_id);
    }

    pub fn channel(&self, channel_id: ChannelId) -> Option<FakeChannel> {
        self.state.lock().channels.get(&channel_id).cloned()
    }

    pub fn channel_exists(&self, channel_id: ChannelId) -> bool {
        self.state.lock().channels.contains_key(&channel_id)
    }

    pub fn categories(&self, guild_id: GuildId) -> Vec<ChannelId> {
        self.state
            .lock()
            .channels
            .iter()
            .filter(|(_, c)| c.is_category && c.guild_id == guild_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Text channels of a guild, excluding categories.
    pub fn text_channels(&self, guild_id: GuildId) -> Vec<ChannelId> {
        self.state
            .lock()
            .channels
            .iter()
            .filter(|(_, c)| !c.is_category && c.guild_id == guild_id)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn overwrites(&self, channel_id: ChannelId) -> Option<Vec<PermissionOverwrite>> {
        self.channel(channel_id).map(|c| c.overwrites)
    }

    pub fn forwards(&self) -> Vec<Forwarded> {
        self.state.lock().forwards.clone()
    }

    pub fn forward_attempts(&self) -> usize {
        self.state.lock().forward_attempts
    }

    pub fn alerts(&self) -> Vec<FilterAlert> {
        self.state.lock().alerts.clone()
    }

    fn next_id(&self) -> ChannelId {
        ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn channel_op(&self) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        state.channel_op_attempts += 1;
        if state.failing_channel_ops > 0 {
            state.failing_channel_ops -= 1;
            return Err(PlatformError::Rejected {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelApi for FakePlatform {
    async fn find_category(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<ChannelId>, PlatformError> {
        tokio::task::yield_now().await;
        Ok(self
            .state
            .lock()
            .channels
            .iter()
            .find(|(_, c)| c.is_category && c.guild_id == guild_id && c.name == name)
            .map(|(id, _)| *id))
    }

    async fn create_category(
        &self,
        guild_id: GuildId,
        name: &str,
        overwrites: &[PermissionOverwrite],
    ) -> Result<ChannelId, PlatformError> {
        tokio::task::yield_now().await;
        self.channel_op()?;
        let id = self.next_id();
        self.state.lock().channels.insert(
            id,
            FakeChannel {
                guild_id,
                name: name.to_string(),
                parent: None,
                is_category: true,
                overwrites: overwrites.to_vec(),
            },
        );
        Ok(id)
    }

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        name: &str,
    ) -> Result<ChannelId, PlatformError> {
        tokio::task::yield_now().await;
        self.channel_op()?;
        let id = self.next_id();
        self.state.lock().channels.insert(
            id,
            FakeChannel {
                guild_id,
                name: name.to_string(),
                parent: Some(category_id),
                is_category: false,
                overwrites: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        self.channel_op()?;
        match self.state.lock().channels.remove(&channel_id) {
            Some(_) => Ok(()),
            None => Err(PlatformError::UnknownChannel(channel_id)),
        }
    }
}

#[async_trait]
impl ModeratorDirectory for FakePlatform {
    async fn moderator_roles(&self, guild_id: GuildId) -> Result<Vec<RoleId>, PlatformError> {
        Ok(self.state.lock().roles.get(&guild_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RelayTransport for FakePlatform {
    async fn forward(
        &self,
        channel_id: ChannelId,
        display_name: &str,
        avatar_url: Option<&str>,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), PlatformError> {
        let delay = self.state.lock().forward_delays.get(&channel_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.forward_attempts += 1;
        let attempt = state.forward_attempts;
        if state.failing_forwards > 0 || state.failing_forward_attempts.remove(&attempt) {
            state.failing_forwards = state.failing_forwards.saturating_sub(1);
            return Err(PlatformError::Transport("connection reset".into()));
        }
        if !state.channels.contains_key(&channel_id) {
            return Err(PlatformError::UnknownChannel(channel_id));
        }

        state.forwards.push(Forwarded {
            channel_id,
            display_name: display_name.to_string(),
            avatar_url: avatar_url.map(str::to_string),
            content: content.to_string(),
            attachments: attachments.iter().map(|a| a.filename.clone()).collect(),
        });
        Ok(())
    }

    fn max_content_chars(&self) -> usize {
        self.state.lock().max_content_chars.unwrap_or(usize::MAX)
    }
}

#[async_trait]
impl AlertSink for FakePlatform {
    async fn alert(&self, alert: &FilterAlert) -> Result<(), PlatformError> {
        self.state.lock().alerts.push(alert.clone());
        Ok(())
    }
}

/// Watchlist store kept in memory, counting deletions and able to fail inserts.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<(GuildId, UserId), WatchlistEntry>>,
    deletes: AtomicUsize,
    fail_inserts: AtomicBool,
    insert_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, entry: WatchlistEntry) {
        self.entries
            .lock()
            .insert((entry.guild_id, entry.user_id), entry);
    }

    pub fn get(&self, guild_id: GuildId, user_id: UserId) -> Option<WatchlistEntry> {
        self.entries.lock().get(&(guild_id, user_id)).cloned()
    }

    /// Number of `delete_one` calls that removed something.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Slow down every insert, leaving a window between channel creation and
    /// the store write.
    pub fn set_insert_delay(&self, delay: Duration) {
        *self.insert_delay.lock() = Some(delay);
    }
}

#[async_trait]
impl WatchlistStore for MemoryStore {
    async fn find(&self, guild_id: GuildId) -> Result<Vec<WatchlistEntry>, WatchlistError> {
        Ok(self
            .entries
            .lock()
            .values()
            .filter(|e| e.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn find_one(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<WatchlistEntry>, WatchlistError> {
        Ok(self.get(guild_id, user_id))
    }

    async fn insert(&self, entry: &WatchlistEntry) -> Result<(), WatchlistError> {
        let delay = *self.insert_delay.lock();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(WatchlistError::Store(anyhow::anyhow!("store unavailable")));
        }

        let mut entries = self.entries.lock();
        let key = (entry.guild_id, entry.user_id);
        if entries.contains_key(&key) {
            return Err(WatchlistError::DuplicateEntry {
                guild_id: entry.guild_id,
                user_id: entry.user_id,
            });
        }
        entries.insert(key, entry.clone());
        Ok(())
    }

    async fn delete_one(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<bool, WatchlistError> {
        tokio::task::yield_now().await;
        let removed = self.entries.lock().remove(&(guild_id, user_id)).is_some();
        if removed {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    async fn set_filters(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        filters: &[String],
    ) -> Result<bool, WatchlistError> {
        match self.entries.lock().get_mut(&(guild_id, user_id)) {
            Some(entry) => {
                entry.filters = filters.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
