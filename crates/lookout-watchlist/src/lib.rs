//! Watchlist core: keeps a per-guild index of watched users, mirrors their
//! messages into private audit channels and raises alerts when a message
//! matches one of their filters.
//!
//! - [`filter`]: pattern compilation and matching
//! - [`store`]: persistence contract plus the SQLite adapter
//! - [`platform`]: capabilities the chat platform has to provide
//! - [`provisioner`]: watchlist category and audit channel lifecycle
//! - [`cache`]: the in-memory watchlist and its four mutations
//! - [`relay`]: per-message relay, self-healing and filter alerts
//! - [`retry`]: bounded retries for transient platform failures
//! - [`dispatcher`]: per-guild event queues and per-user ordering

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod filter;
mod locks;
pub mod platform;
pub mod provisioner;
pub mod relay;
pub mod retry;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{WatchedUser, WatchlistCache};
pub use dispatcher::Dispatcher;
pub use error::{PlatformError, WatchlistError};
pub use filter::FilterSet;
pub use platform::Platform;
pub use provisioner::ChannelProvisioner;
pub use relay::{RelayEngine, RelayOutcome};
pub use retry::RetryPolicy;
pub use store::{SqliteStore, WatchlistStore};
