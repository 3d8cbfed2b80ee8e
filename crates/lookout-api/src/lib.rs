pub mod error;
pub mod events;
pub mod state;
pub mod watchlist;

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

pub use state::{AppState, AppStateInner};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/guilds/{guild_id}/watchlist",
            get(watchlist::list).post(watchlist::add_member),
        )
        .route(
            "/guilds/{guild_id}/watchlist/{user_id}",
            delete(watchlist::remove_member),
        )
        .route(
            "/guilds/{guild_id}/watchlist/{user_id}/filters",
            post(watchlist::add_filters),
        )
        .route("/gateway/events", post(events::ingest))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "ready": state.cache.is_ready() }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use lookout_types::api::{ErrorResponse, WatchlistEntryResponse};
    use lookout_types::{ChannelId, GuildId, UserId};
    use lookout_watchlist::testing::{FakePlatform, MemoryStore};
    use lookout_watchlist::{
        ChannelProvisioner, Dispatcher, RelayEngine, RetryPolicy, WatchlistCache,
    };

    use super::*;

    const GUILD: GuildId = GuildId(1);

    struct Harness {
        app: Router,
        cache: Arc<WatchlistCache>,
        platform: Arc<FakePlatform>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(FakePlatform::new());
        let cache = Arc::new(WatchlistCache::new(
            store,
            ChannelProvisioner::new(platform.clone(), platform.clone()),
        ));
        let retry = RetryPolicy {
            attempts: 1,
            base_delay: Duration::from_millis(1),
        };
        let engine = Arc::new(RelayEngine::new(
            cache.clone(),
            platform.clone(),
            platform.clone(),
            retry,
        ));
        let state = Arc::new(AppStateInner {
            cache: cache.clone(),
            dispatcher: Dispatcher::new(engine),
        });
        Harness {
            app: router(state),
            cache,
            platform,
        }
    }

    async fn ready_harness() -> Harness {
        let h = harness();
        h.cache.load(&[GUILD]).await.unwrap();
        h
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn add(app: &Router, user: u64, filters: Value) -> (StatusCode, Vec<u8>) {
        send(
            app,
            Method::POST,
            "/guilds/1/watchlist",
            Some(json!({ "user_id": user, "username": "Hattyot", "filters": filters })),
        )
        .await
    }

    #[tokio::test]
    async fn add_list_and_remove() {
        let h = ready_harness().await;

        let (status, body) = add(&h.app, 42, json!(["sus"])).await;
        assert_eq!(status, StatusCode::CREATED);
        let created: WatchlistEntryResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.user_id, UserId(42));
        assert_eq!(created.filters, vec!["sus".to_string()]);
        assert!(h.platform.channel_exists(created.channel_id));

        let (status, body) = send(&h.app, Method::GET, "/guilds/1/watchlist", None).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<WatchlistEntryResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].channel_id, created.channel_id);

        let (status, _) = send(&h.app, Method::DELETE, "/guilds/1/watchlist/42", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!h.platform.channel_exists(created.channel_id));

        let (status, _) = send(&h.app, Method::DELETE, "/guilds/1/watchlist/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_add_conflicts() {
        let h = ready_harness().await;
        assert_eq!(add(&h.app, 42, json!([])).await.0, StatusCode::CREATED);

        let (status, body) = add(&h.app, 42, json!(["x"])).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(error.error.contains("already on the watchlist"));
        assert!(h.cache.get(GUILD, UserId(42)).unwrap().entry.filters.is_empty());
    }

    #[tokio::test]
    async fn bad_filters_are_rejected() {
        let h = ready_harness().await;

        let (status, _) = add(&h.app, 42, json!(["(unclosed"])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.cache.get(GUILD, UserId(42)).is_none());
        assert!(h.platform.text_channels(GUILD).is_empty());
    }

    #[tokio::test]
    async fn filters_are_merged() {
        let h = ready_harness().await;
        add(&h.app, 42, json!(["a"])).await;

        let (status, body) = send(
            &h.app,
            Method::POST,
            "/guilds/1/watchlist/42/filters",
            Some(json!({ "filters": ["b"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entry: WatchlistEntryResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(entry.filters, vec!["b".to_string(), "a".to_string()]);

        let (status, _) = send(
            &h.app,
            Method::POST,
            "/guilds/1/watchlist/7/filters",
            Some(json!({ "filters": ["b"] })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn management_waits_for_the_initial_load() {
        let h = harness();

        let (status, _) = add(&h.app, 42, json!([])).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = send(&h.app, Method::GET, "/guilds/1/watchlist", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = send(&h.app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["ready"], json!(false));
    }

    #[tokio::test]
    async fn gateway_events_are_relayed() {
        let h = ready_harness().await;
        let (_, body) = add(&h.app, 42, json!([])).await;
        let created: WatchlistEntryResponse = serde_json::from_slice(&body).unwrap();

        let event = json!({
            "type": "MessageCreate",
            "data": {
                "id": 900,
                "guild_id": 1,
                "channel_id": 20,
                "author": { "id": 42, "name": "Hattyot", "avatar_url": null },
                "content": "hello",
                "attachments": []
            }
        });
        let (status, _) = send(&h.app, Method::POST, "/gateway/events", Some(event)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        for _ in 0..200 {
            if !h.platform.forwards().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let forwards = h.platform.forwards();
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].channel_id, created.channel_id);
        assert_ne!(forwards[0].channel_id, ChannelId(20));
    }

    #[tokio::test]
    async fn malformed_events_are_rejected() {
        let h = ready_harness().await;
        let (status, _) = send(
            &h.app,
            Method::POST,
            "/gateway/events",
            Some(json!({ "type": "Nope" })),
        )
        .await;
        assert!(status.is_client_error());
    }
}
