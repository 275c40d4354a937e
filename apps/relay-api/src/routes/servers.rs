//! Server listing endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::models::server::Server;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/servers", get(list_servers))
}

#[utoipa::path(
    get,
    path = "/servers",
    responses((status = 200, body = [Server])),
    tag = "Servers"
)]
pub async fn list_servers(State(state): State<AppState>) -> Result<Json<Vec<Server>>, ApiError> {
    Ok(Json(state.store.list_servers().await?))
}
