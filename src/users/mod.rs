mod dto;
pub mod handlers;
pub mod password;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::collection_routes())
        .merge(handlers::item_routes())
}
