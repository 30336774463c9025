//! Authorization and ban administration route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn access_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth", post(authenticate))
        .route("/api/operators", get(list_operators))
        .route("/api/bans", get(list_bans).post(create_ban))
        .route("/api/bans/:identity", delete(delete_ban))
}
