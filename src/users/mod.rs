pub mod dto;
pub mod handlers;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::user_routes())
        .merge(handlers::favorites_routes())
}

pub fn admin_router() -> Router<AppState> {
    handlers::admin_routes()
}
