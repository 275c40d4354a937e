//! Channel listing endpoint.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::models::channel::Channel;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/channels/{server_id}", get(list_channels))
}

#[utoipa::path(
    get,
    path = "/channels/{server_id}",
    params(("server_id" = String, Path, description = "Server to list channels for")),
    responses(
        (status = 200, body = [Channel]),
        (status = 404, body = crate::error::ApiErrorBody),
    ),
    tag = "Channels"
)]
pub async fn list_channels(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    Ok(Json(state.store.list_channels(&server_id).await?))
}
