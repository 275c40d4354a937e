pub mod channels;
pub mod health;
pub mod servers;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(servers::router())
        .merge(channels::router())
        .merge(crate::relay::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, servers::list_servers, channels::list_channels),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::models::server::Server,
            crate::models::channel::Channel,
            health::HealthResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Servers", description = "Server listing"),
        (name = "Channels", description = "Channel listing"),
    )
)]
pub struct ApiDoc;
