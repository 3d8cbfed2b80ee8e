use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use lookout_types::api::{AddFiltersRequest, AddMemberRequest, WatchlistEntryResponse};
use lookout_types::{GuildId, UserId};
use lookout_watchlist::WatchlistError;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Path(guild_id): Path<GuildId>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.cache.is_ready() {
        return Err(WatchlistError::NotReady.into());
    }
    state.cache.ensure_loaded(guild_id).await?;

    let entries: Vec<WatchlistEntryResponse> = state
        .cache
        .list(guild_id)
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(entries))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(guild_id): Path<GuildId>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .cache
        .add_member(guild_id, req.user_id, &req.username, req.filters)
        .await?;
    Ok((StatusCode::CREATED, Json(WatchlistEntryResponse::from(entry))))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(GuildId, UserId)>,
) -> Result<impl IntoResponse, ApiError> {
    state.cache.remove_member(guild_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_filters(
    State(state): State<AppState>,
    Path((guild_id, user_id)): Path<(GuildId, UserId)>,
    Json(req): Json<AddFiltersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .cache
        .add_filters(guild_id, user_id, req.filters)
        .await?;
    Ok(Json(WatchlistEntryResponse::from(entry)))
}
