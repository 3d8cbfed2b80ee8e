mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use lookout_api::{AppState, AppStateInner};
use lookout_db::Database;
use lookout_platform::{DiscordClient, DiscordConfig};
use lookout_types::GuildId;
use lookout_watchlist::{
    ChannelProvisioner, Dispatcher, Platform, RelayEngine, SqliteStore, WatchlistCache,
};

use crate::config::Config;

/// Pause between attempts to populate the watchlist at startup.
const LOAD_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lookout=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);

    let mut discord = DiscordConfig::new(config.bot_token.clone());
    discord.api_base = config.api_base.clone();
    let client = Arc::new(DiscordClient::new(discord)?);
    let platform = Platform::from_client(client.clone());

    let cache = Arc::new(WatchlistCache::new(
        Arc::new(SqliteStore::new(db)),
        ChannelProvisioner::new(platform.channels.clone(), platform.moderators.clone())
            .with_retry(config.retry_policy()),
    ));
    let engine = Arc::new(RelayEngine::new(
        cache.clone(),
        platform.relay.clone(),
        platform.alerts.clone(),
        config.retry_policy(),
    ));
    let dispatcher = Dispatcher::new(engine);

    // Events that arrive before this finishes are held in the guild queues.
    tokio::spawn(initial_load(cache.clone(), client, config.guilds.clone()));

    let state: AppState = Arc::new(AppStateInner {
        cache,
        dispatcher: dispatcher.clone(),
    });
    let app = lookout_api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Lookout listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining queued gateway events...");
    dispatcher.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Populate the watchlist, retrying until it succeeds. Guilds come from the
/// config or, when none are configured, from the platform.
async fn initial_load(cache: Arc<WatchlistCache>, client: Arc<DiscordClient>, configured: Vec<GuildId>) {
    loop {
        let guilds = if configured.is_empty() {
            match client.current_guilds().await {
                Ok(guilds) => guilds,
                Err(e) => {
                    warn!("Failed to list guilds, retrying in {:?}: {}", LOAD_RETRY_DELAY, e);
                    tokio::time::sleep(LOAD_RETRY_DELAY).await;
                    continue;
                }
            }
        } else {
            configured.clone()
        };

        match cache.load(&guilds).await {
            Ok(count) => {
                info!("Watchlist ready: {} entries across {} guilds", count, guilds.len());
                return;
            }
            Err(e) => {
                error!("Failed to load watchlist, retrying in {:?}: {}", LOAD_RETRY_DELAY, e);
                tokio::time::sleep(LOAD_RETRY_DELAY).await;
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
