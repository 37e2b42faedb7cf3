mod cors;

use axum::Router;
use axum::routing::{get, post};
use rigger_core::AppError;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

use cors::build_cors_layer;

pub fn build_router(app_state: AppState, frontend_urls: &[String]) -> Result<Router, AppError> {
    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/create-server",
            post(handlers::provisioning::create_server_handler),
        )
        .route(
            "/destroy-server",
            post(handlers::provisioning::destroy_server_handler),
        )
        .route(
            "/requests/{request_id}",
            get(handlers::provisioning::request_status_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_urls)?)
        .with_state(app_state))
}
