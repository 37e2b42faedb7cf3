use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::HealthResponse;
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let audit_store = state.provisioning_service.audit_store();
    let ping = audit_store.ping().await;

    let (http_status, status, detail) = match ping {
        Ok(()) => (StatusCode::OK, "ok", None),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "degraded",
            Some(error.to_string()),
        ),
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            audit_backend: audit_store.backend_name(),
            audit_reachable: detail.is_none(),
            detail,
        }),
    )
}
