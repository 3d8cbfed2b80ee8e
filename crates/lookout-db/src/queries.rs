use crate::Database;
use crate::models::WatchlistRow;
use anyhow::Result;
use lookout_types::models::WatchlistEntry;
use lookout_types::{ChannelId, GuildId, UserId};
use rusqlite::Connection;
use tracing::warn;

// Snowflakes fit in 63 bits, so the i64 casts below are lossless.

impl Database {
    // -- Watchlist --

    pub fn get_watchlist(&self, guild_id: GuildId) -> Result<Vec<WatchlistEntry>> {
        let rows = self.with_conn(|conn| query_watchlist(conn, guild_id))?;
        Ok(rows.into_iter().map(row_to_entry).collect())
    }

    pub fn get_watchlist_entry(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<WatchlistEntry>> {
        let row = self.with_conn(|conn| query_watchlist_entry(conn, guild_id, user_id))?;
        Ok(row.map(row_to_entry))
    }

    /// Insert a new entry. Returns false if one already exists for the key.
    pub fn insert_watchlist_entry(&self, entry: &WatchlistEntry) -> Result<bool> {
        let filters = serde_json::to_string(&entry.filters)?;
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO watchlist (guild_id, user_id, channel_id, filters)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    entry.guild_id.0 as i64,
                    entry.user_id.0 as i64,
                    entry.channel_id.0 as i64,
                    filters
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Returns false if there was nothing to delete.
    pub fn delete_watchlist_entry(&self, guild_id: GuildId, user_id: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM watchlist WHERE guild_id = ?1 AND user_id = ?2",
                (guild_id.0 as i64, user_id.0 as i64),
            )?;
            Ok(deleted > 0)
        })
    }

    /// Replace the stored filter list. Returns false if the entry does not exist.
    pub fn set_watchlist_filters(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        filters: &[String],
    ) -> Result<bool> {
        let filters = serde_json::to_string(filters)?;
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE watchlist SET filters = ?3 WHERE guild_id = ?1 AND user_id = ?2",
                rusqlite::params![guild_id.0 as i64, user_id.0 as i64, filters],
            )?;
            Ok(updated > 0)
        })
    }
}

/// A row whose filter column does not decode is still watched, just without
/// filters, so one bad row cannot keep a guild from loading.
fn row_to_entry(row: WatchlistRow) -> WatchlistEntry {
    let filters = match serde_json::from_str::<Vec<String>>(&row.filters) {
        Ok(filters) => filters,
        Err(e) => {
            warn!(
                "Corrupt filters for user {} in guild {}, loading without filters: {}",
                row.user_id, row.guild_id, e
            );
            Vec::new()
        }
    };

    WatchlistEntry {
        guild_id: GuildId(row.guild_id as u64),
        user_id: UserId(row.user_id as u64),
        filters,
        channel_id: ChannelId(row.channel_id as u64),
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WatchlistRow> {
    Ok(WatchlistRow {
        guild_id: row.get(0)?,
        user_id: row.get(1)?,
        channel_id: row.get(2)?,
        filters: row.get(3)?,
    })
}

fn query_watchlist(conn: &Connection, guild_id: GuildId) -> Result<Vec<WatchlistRow>> {
    let mut stmt = conn.prepare(
        "SELECT guild_id, user_id, channel_id, filters
         FROM watchlist
         WHERE guild_id = ?1
         ORDER BY created_at, user_id",
    )?;

    let rows = stmt
        .query_map([guild_id.0 as i64], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_watchlist_entry(
    conn: &Connection,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<Option<WatchlistRow>> {
    let mut stmt = conn.prepare(
        "SELECT guild_id, user_id, channel_id, filters
         FROM watchlist
         WHERE guild_id = ?1 AND user_id = ?2",
    )?;

    let row = stmt
        .query_row((guild_id.0 as i64, user_id.0 as i64), map_row)
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
