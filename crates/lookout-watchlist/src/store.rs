use std::sync::Arc;

use async_trait::async_trait;
use lookout_db::Database;
use lookout_types::models::WatchlistEntry;
use lookout_types::{GuildId, UserId};

use crate::error::WatchlistError;

/// Persistence contract for watchlist entries, keyed by (guild, user).
///
/// No transactional guarantee is assumed: callers check existence through
/// the cache first, and the cache is the only writer in the process.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    async fn find(&self, guild_id: GuildId) -> Result<Vec<WatchlistEntry>, WatchlistError>;

    async fn find_one(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<WatchlistEntry>, WatchlistError>;

    /// Fails with [`WatchlistError::DuplicateEntry`] if the key is taken.
    async fn insert(&self, entry: &WatchlistEntry) -> Result<(), WatchlistError>;

    /// Returns false if there was nothing to delete.
    async fn delete_one(&self, guild_id: GuildId, user_id: UserId)
    -> Result<bool, WatchlistError>;

    /// Returns false if the entry does not exist.
    async fn set_filters(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        filters: &[String],
    ) -> Result<bool, WatchlistError>;
}

/// [`WatchlistStore`] backed by the SQLite database. Queries run on the
/// blocking pool so they never stall the event loop.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, WatchlistError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| WatchlistError::Store(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
            .map_err(WatchlistError::Store)
    }
}

#[async_trait]
impl WatchlistStore for SqliteStore {
    async fn find(&self, guild_id: GuildId) -> Result<Vec<WatchlistEntry>, WatchlistError> {
        self.blocking(move |db| db.get_watchlist(guild_id)).await
    }

    async fn find_one(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<WatchlistEntry>, WatchlistError> {
        self.blocking(move |db| db.get_watchlist_entry(guild_id, user_id))
            .await
    }

    async fn insert(&self, entry: &WatchlistEntry) -> Result<(), WatchlistError> {
        let row = entry.clone();
        let inserted = self
            .blocking(move |db| db.insert_watchlist_entry(&row))
            .await?;

        if !inserted {
            return Err(WatchlistError::DuplicateEntry {
                guild_id: entry.guild_id,
                user_id: entry.user_id,
            });
        }
        Ok(())
    }

    async fn delete_one(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<bool, WatchlistError> {
        self.blocking(move |db| db.delete_watchlist_entry(guild_id, user_id))
            .await
    }

    async fn set_filters(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        filters: &[String],
    ) -> Result<bool, WatchlistError> {
        let filters = filters.to_vec();
        self.blocking(move |db| db.set_watchlist_filters(guild_id, user_id, &filters))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_types::ChannelId;

    fn store() -> SqliteStore {
        SqliteStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn duplicate_insert_reports_duplicate_entry() {
        let store = store();
        let entry = WatchlistEntry {
            guild_id: GuildId(1),
            user_id: UserId(2),
            filters: vec![],
            channel_id: ChannelId(3),
        };

        store.insert(&entry).await.unwrap();
        let err = store.insert(&entry).await.unwrap_err();
        assert!(matches!(err, WatchlistError::DuplicateEntry { .. }));
        assert_eq!(store.find(GuildId(1)).await.unwrap(), vec![entry.clone()]);
        assert_eq!(store.find_one(GuildId(1), UserId(2)).await.unwrap(), Some(entry));
        assert_eq!(store.find_one(GuildId(1), UserId(9)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = store();
        assert!(!store.delete_one(GuildId(1), UserId(2)).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_row_does_not_block_initial_load() {
        use crate::cache::WatchlistCache;
        use crate::provisioner::ChannelProvisioner;
        use crate::testing::FakePlatform;

        let db = Arc::new(Database::open_in_memory().unwrap());
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO watchlist (guild_id, user_id, channel_id, filters)
                 VALUES (1, 2, 20, 'not json');
                 INSERT INTO watchlist (guild_id, user_id, channel_id, filters)
                 VALUES (9, 3, 30, '[\"sus\"]');",
            )?;
            Ok(())
        })
        .unwrap();

        let platform = Arc::new(FakePlatform::new());
        let cache = WatchlistCache::new(
            Arc::new(SqliteStore::new(db)),
            ChannelProvisioner::new(platform.clone(), platform),
        );

        assert_eq!(cache.load(&[GuildId(1), GuildId(9)]).await.unwrap(), 2);
        assert!(cache.is_ready());

        let corrupt = cache.get(GuildId(1), UserId(2)).unwrap();
        assert!(corrupt.entry.filters.is_empty());
        assert_eq!(corrupt.entry.channel_id, ChannelId(20));
        assert!(cache.get(GuildId(9), UserId(3)).unwrap().filters.matches("sus"));
    }
}
