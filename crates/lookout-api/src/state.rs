use std::sync::Arc;

use lookout_watchlist::{Dispatcher, WatchlistCache};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub cache: Arc<WatchlistCache>,
    pub dispatcher: Dispatcher,
}
