use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use lookout_types::api::ErrorResponse;
use lookout_watchlist::WatchlistError;

/// Watchlist failures rendered as a status code plus a JSON `{"error": ..}` body.
#[derive(Debug)]
pub struct ApiError(pub WatchlistError);

impl From<WatchlistError> for ApiError {
    fn from(e: WatchlistError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            WatchlistError::AlreadyWatched { .. } | WatchlistError::DuplicateEntry { .. } => {
                StatusCode::CONFLICT
            }
            WatchlistError::NotWatched { .. } => StatusCode::NOT_FOUND,
            WatchlistError::BadFilter { .. } => StatusCode::BAD_REQUEST,
            WatchlistError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            WatchlistError::ChannelGone(_) | WatchlistError::Platform(_) => StatusCode::BAD_GATEWAY,
            WatchlistError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Watchlist request failed: {}", self.0);
        } else {
            warn!("Watchlist request rejected: {}", self.0);
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
