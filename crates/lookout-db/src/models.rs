/// Database row types. These map directly to SQLite rows and are kept
/// separate from lookout-types so the DB layer stays independent.

pub struct WatchlistRow {
    pub guild_id: i64,
    pub user_id: i64,
    pub channel_id: i64,
    /// JSON array of patterns.
    pub filters: String,
}
