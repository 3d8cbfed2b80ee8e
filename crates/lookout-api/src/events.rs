use axum::{Json, extract::State, http::StatusCode};
use tracing::trace;

use lookout_types::events::GatewayEvent;

use crate::state::AppState;

/// Ingest one event from the gateway bridge. Accepted events are queued; they
/// are processed once the watchlist has finished loading.
pub async fn ingest(State(state): State<AppState>, Json(event): Json<GatewayEvent>) -> StatusCode {
    trace!("Gateway event for guild {:?}", event.guild_id());
    state.dispatcher.dispatch(event).await;
    StatusCode::ACCEPTED
}
