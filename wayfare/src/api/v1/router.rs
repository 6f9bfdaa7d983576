use axum::{middleware, routing::get, routing::post, Router};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::v1_auth_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .merge(super::openapi::redoc_router());

    let protected_routes = Router::new()
        .route(
            "/suggestions:consolidate",
            post(handlers::suggestions::consolidate_suggestions),
        )
        .route(
            "/suggestions:generate",
            post(handlers::suggestions::generate_suggestions),
        );

    // No keys configured means local, unauthenticated use.
    let protected_routes = if state.config.auth_enabled() {
        protected_routes.route_layer(middleware::from_fn_with_state(state, v1_auth_middleware))
    } else {
        protected_routes
    };

    Router::new().merge(public_routes).merge(protected_routes)
}
