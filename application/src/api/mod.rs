//! HTTP API definitions.

pub mod auth;

use axum::{
    routing::{delete, get, post},
    Router,
};

/// Creates a new [`Router`] serving the whole HTTP API.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/v1/auth/login", post(auth::log_in))
        .route("/v1/auth/refresh", post(auth::refresh))
        .route("/v1/auth/logout", post(auth::log_out))
        .route("/v1/auth/me", get(auth::me))
        .route("/v1/auth/sessions", delete(auth::revoke_all))
}
