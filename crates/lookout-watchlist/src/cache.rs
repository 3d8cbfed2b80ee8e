use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use lookout_types::models::WatchlistEntry;
use lookout_types::{ChannelId, GuildId, UserId};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::WatchlistError;
use crate::filter::{self, FilterSet};
use crate::locks::KeyedLocks;
use crate::provisioner::ChannelProvisioner;
use crate::store::WatchlistStore;

/// A cached entry together with its compiled filters.
#[derive(Debug)]
pub struct WatchedUser {
    pub entry: WatchlistEntry,
    pub filters: FilterSet,
}

type GuildWatchlist = HashMap<UserId, Arc<WatchedUser>>;

/// In-memory mirror of the watchlist store, one map per guild.
///
/// Every mutation writes the store first and the map second, so a crash in
/// between can only leave the store ahead. Mutations of the same
/// (guild, user) key are serialized, and a guild is never (re)loaded while
/// one of its mutations is in flight. Lookups never wait on either.
pub struct WatchlistCache {
    store: Arc<dyn WatchlistStore>,
    provisioner: ChannelProvisioner,
    guilds: RwLock<HashMap<GuildId, GuildWatchlist>>,
    key_locks: KeyedLocks<(GuildId, UserId)>,
    load_locks: KeyedLocks<GuildId>,
    ready: watch::Sender<bool>,
}

impl WatchlistCache {
    pub fn new(store: Arc<dyn WatchlistStore>, provisioner: ChannelProvisioner) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            store,
            provisioner,
            guilds: RwLock::new(HashMap::new()),
            key_locks: KeyedLocks::new(),
            load_locks: KeyedLocks::new(),
            ready,
        }
    }

    // -- Loading --

    /// Initial population. Loads every guild, then opens the readiness gate.
    pub async fn load(&self, guild_ids: &[GuildId]) -> Result<usize, WatchlistError> {
        let mut total = 0;
        for guild_id in guild_ids {
            total += self.load_guild(*guild_id).await?;
        }

        self.mark_ready();
        info!(
            "Watchlist loaded: {} watched users across {} guilds",
            total,
            guild_ids.len()
        );
        Ok(total)
    }

    /// (Re)read one guild from the store, replacing its map. Waits for
    /// in-flight mutations of the guild so none of them is lost.
    pub async fn load_guild(&self, guild_id: GuildId) -> Result<usize, WatchlistError> {
        let _gate = self.load_locks.lock(guild_id).await;
        self.read_guild(guild_id).await
    }

    /// Load a guild unless it is already cached.
    pub async fn ensure_loaded(&self, guild_id: GuildId) -> Result<(), WatchlistError> {
        if self.guilds.read().contains_key(&guild_id) {
            return Ok(());
        }

        let _gate = self.load_locks.lock(guild_id).await;
        if self.guilds.read().contains_key(&guild_id) {
            return Ok(());
        }
        self.read_guild(guild_id).await.map(|_| ())
    }

    /// Callers hold the guild's load lock.
    async fn read_guild(&self, guild_id: GuildId) -> Result<usize, WatchlistError> {
        let entries = self.store.find(guild_id).await?;
        let count = entries.len();

        let map: GuildWatchlist = entries
            .into_iter()
            .map(|entry| {
                let filters = FilterSet::compile_lenient(&entry.filters);
                (entry.user_id, Arc::new(WatchedUser { entry, filters }))
            })
            .collect();

        self.guilds.write().insert(guild_id, map);
        debug!("Loaded {} watchlist entries for guild {}", count, guild_id);
        Ok(count)
    }

    /// Drop a guild the bot no longer serves. Store records are kept, and a
    /// mutation finishing afterwards only reaches the store.
    pub fn forget_guild(&self, guild_id: GuildId) {
        if self.guilds.write().remove(&guild_id).is_some() {
            info!("Dropped cached watchlist for guild {}", guild_id);
        }
    }

    // -- Readiness --

    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolves once initial population has finished.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this only returns once ready.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn check_ready(&self) -> Result<(), WatchlistError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(WatchlistError::NotReady)
        }
    }

    // -- Lookups --

    /// Unknown guilds and users are simply "not watched".
    pub fn get(&self, guild_id: GuildId, user_id: UserId) -> Option<Arc<WatchedUser>> {
        self.guilds
            .read()
            .get(&guild_id)
            .and_then(|users| users.get(&user_id))
            .cloned()
    }

    /// Every entry of a guild, ordered by user id.
    pub fn list(&self, guild_id: GuildId) -> Vec<WatchlistEntry> {
        let mut entries: Vec<WatchlistEntry> = self
            .guilds
            .read()
            .get(&guild_id)
            .map(|users| users.values().map(|w| w.entry.clone()).collect())
            .unwrap_or_default();
        entries.sort_by_key(|e| e.user_id);
        entries
    }

    // -- Mutations --
    //
    // Each mutation runs on its own task. A caller that stops waiting (a
    // dropped request, a timeout) does not stop it halfway between the
    // platform and the store.

    async fn detached<T, F, Fut>(self: &Arc<Self>, op: F) -> Result<T, WatchlistError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T, WatchlistError>> + Send + 'static,
    {
        tokio::spawn(op(self.clone()))
            .await
            .map_err(|e| WatchlistError::Store(anyhow!("watchlist task failed: {e}")))?
    }

    /// Put a user on the watchlist with a fresh audit channel.
    ///
    /// If the store rejects the entry, the channel created for it is deleted
    /// again so no empty audit channels are left behind.
    pub async fn add_member(
        self: &Arc<Self>,
        guild_id: GuildId,
        user_id: UserId,
        display_name: &str,
        filters: Vec<String>,
    ) -> Result<WatchlistEntry, WatchlistError> {
        self.check_ready()?;
        let compiled = FilterSet::compile(&filters)?;
        let display_name = display_name.to_string();
        self.detached(move |cache| async move {
            cache
                .add_member_inner(guild_id, user_id, &display_name, filters, compiled)
                .await
        })
        .await
    }

    async fn add_member_inner(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        display_name: &str,
        filters: Vec<String>,
        compiled: FilterSet,
    ) -> Result<WatchlistEntry, WatchlistError> {
        self.ensure_loaded(guild_id).await?;
        let _gate = self.load_locks.share(guild_id).await;
        let _guard = self.key_locks.lock((guild_id, user_id)).await;

        if self.get(guild_id, user_id).is_some() {
            return Err(WatchlistError::AlreadyWatched { guild_id, user_id });
        }

        let category = self.provisioner.ensure_category(guild_id).await?;
        let channel_id = self
            .provisioner
            .create_user_channel(guild_id, category, display_name)
            .await?;

        let entry = WatchlistEntry {
            guild_id,
            user_id,
            filters,
            channel_id,
        };

        if let Err(e) = self.store.insert(&entry).await {
            if let Err(cleanup) = self.provisioner.delete_channel(channel_id).await {
                warn!("Failed to roll back audit channel {}: {}", channel_id, cleanup);
            }

            return Err(match e {
                WatchlistError::DuplicateEntry { .. } => {
                    // The store is ahead of us; pick its record up.
                    warn!(
                        "User {} in guild {} was in the store but not the cache",
                        user_id, guild_id
                    );
                    self.refresh_entry(guild_id, user_id).await;
                    WatchlistError::AlreadyWatched { guild_id, user_id }
                }
                other => other,
            });
        }

        self.insert_cached(entry.clone(), compiled);
        info!(
            "User {} in guild {} added to the watchlist ({} filters)",
            user_id,
            guild_id,
            entry.filters.len()
        );
        Ok(entry)
    }

    /// Take a user off the watchlist. The audit channel is deleted on a best
    /// effort basis; one that cannot be deleted is abandoned.
    pub async fn remove_member(
        self: &Arc<Self>,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<WatchlistEntry, WatchlistError> {
        self.check_ready()?;
        self.detached(move |cache| async move {
            cache.remove_member_inner(guild_id, user_id).await
        })
        .await
    }

    async fn remove_member_inner(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<WatchlistEntry, WatchlistError> {
        self.ensure_loaded(guild_id).await?;
        let _gate = self.load_locks.share(guild_id).await;
        let _guard = self.key_locks.lock((guild_id, user_id)).await;

        let watched = self
            .get(guild_id, user_id)
            .ok_or(WatchlistError::NotWatched { guild_id, user_id })?;
        let channel_id = watched.entry.channel_id;

        if let Err(e) = self.provisioner.delete_channel(channel_id).await {
            warn!("Abandoning audit channel {}: {}", channel_id, e);
        }

        self.store.delete_one(guild_id, user_id).await?;
        self.remove_cached(guild_id, user_id);

        info!("User {} in guild {} removed from the watchlist", user_id, guild_id);
        Ok(watched.entry.clone())
    }

    /// Add filters to a watched user. Rejects the whole batch if any pattern
    /// is invalid, leaving the stored filters untouched.
    pub async fn add_filters(
        self: &Arc<Self>,
        guild_id: GuildId,
        user_id: UserId,
        new_filters: Vec<String>,
    ) -> Result<WatchlistEntry, WatchlistError> {
        self.check_ready()?;
        filter::validate(&new_filters)?;
        self.detached(move |cache| async move {
            cache.add_filters_inner(guild_id, user_id, new_filters).await
        })
        .await
    }

    async fn add_filters_inner(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        new_filters: Vec<String>,
    ) -> Result<WatchlistEntry, WatchlistError> {
        self.ensure_loaded(guild_id).await?;
        let _gate = self.load_locks.share(guild_id).await;
        let _guard = self.key_locks.lock((guild_id, user_id)).await;

        let watched = self
            .get(guild_id, user_id)
            .ok_or(WatchlistError::NotWatched { guild_id, user_id })?;

        let merged = filter::merge_filters(&watched.entry.filters, new_filters);
        if !self.store.set_filters(guild_id, user_id, &merged).await? {
            warn!(
                "User {} in guild {} vanished from the store, dropping cached entry",
                user_id, guild_id
            );
            self.remove_cached(guild_id, user_id);
            return Err(WatchlistError::NotWatched { guild_id, user_id });
        }

        let filters = FilterSet::compile_lenient(&merged);
        let entry = WatchlistEntry {
            filters: merged,
            ..watched.entry.clone()
        };
        self.insert_cached(entry.clone(), filters);

        info!(
            "User {} in guild {} now has {} filters",
            user_id,
            guild_id,
            entry.filters.len()
        );
        Ok(entry)
    }

    /// Forget an entry whose audit channel no longer exists. Only acts if the
    /// entry still points at `channel_id`, so a re-added user is left alone.
    pub async fn evict_dead_channel(
        self: &Arc<Self>,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<bool, WatchlistError> {
        self.detached(move |cache| async move {
            cache.evict_inner(guild_id, user_id, channel_id).await
        })
        .await
    }

    async fn evict_inner(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<bool, WatchlistError> {
        let _gate = self.load_locks.share(guild_id).await;
        let _guard = self.key_locks.lock((guild_id, user_id)).await;

        match self.get(guild_id, user_id) {
            Some(watched) if watched.entry.channel_id == channel_id => {}
            _ => return Ok(false),
        }

        self.store.delete_one(guild_id, user_id).await?;
        self.remove_cached(guild_id, user_id);

        warn!(
            "Audit channel {} for user {} in guild {} is gone, removed from the watchlist",
            channel_id, user_id, guild_id
        );
        Ok(true)
    }

    /// Evict whichever entry used `channel_id` as its audit channel.
    pub async fn evict_channel(
        self: &Arc<Self>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<bool, WatchlistError> {
        let owner = self.guilds.read().get(&guild_id).and_then(|users| {
            users
                .values()
                .find(|w| w.entry.channel_id == channel_id)
                .map(|w| w.entry.user_id)
        });

        match owner {
            Some(user_id) => self.evict_dead_channel(guild_id, user_id, channel_id).await,
            None => Ok(false),
        }
    }

    /// Only guilds that are currently cached are touched; a forgotten guild
    /// is read back from the store on next use.
    fn insert_cached(&self, entry: WatchlistEntry, filters: FilterSet) {
        if let Some(users) = self.guilds.write().get_mut(&entry.guild_id) {
            users.insert(entry.user_id, Arc::new(WatchedUser { entry, filters }));
        }
    }

    fn remove_cached(&self, guild_id: GuildId, user_id: UserId) {
        if let Some(users) = self.guilds.write().get_mut(&guild_id) {
            users.remove(&user_id);
        }
    }

    /// Copy one user's record from the store into the map.
    async fn refresh_entry(&self, guild_id: GuildId, user_id: UserId) {
        match self.store.find_one(guild_id, user_id).await {
            Ok(Some(entry)) => {
                let filters = FilterSet::compile_lenient(&entry.filters);
                self.insert_cached(entry, filters);
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Failed to refresh user {} in guild {} from the store: {}",
                user_id, guild_id, e
            ),
        }
    }
}
