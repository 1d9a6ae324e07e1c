pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod models;
pub mod users;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
}

pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/login", post(handlers::auth::login))
        .route("/register", post(handlers::auth::register));

    let own_profile_routes = Router::new()
        .route("/users/:username", get(handlers::users::get_user))
        .route("/users/:username/to", get(handlers::users::messages_to))
        .route("/users/:username/from", get(handlers::users::messages_from))
        .route_layer(middleware::from_fn(auth::ensure_correct_user));

    // Layers run outermost-last, so the token is checked before the username match.
    let protected_routes = Router::new()
        .route("/users", get(handlers::users::list_users))
        .route("/messages", post(handlers::messages::send_message))
        .route("/messages/:id", get(handlers::messages::get_message))
        .route("/messages/:id/read", post(handlers::messages::mark_read))
        .merge(own_profile_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
