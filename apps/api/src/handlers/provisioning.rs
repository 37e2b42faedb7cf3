use axum::Json;
use axum::extract::{Path, State};
use rigger_domain::{ProvisionRequest, RequestId};

use crate::dto::{DeployRequest, ProvisionResponse, RequestStatusResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_server_handler(
    State(state): State<AppState>,
    Json(payload): Json<DeployRequest>,
) -> ApiResult<Json<ProvisionResponse>> {
    let request = ProvisionRequest::new(payload.user, payload.device_id, payload.instance_name)?;
    let receipt = state.provisioning_service.create_server(request).await?;

    Ok(Json(ProvisionResponse::from(receipt)))
}

pub async fn destroy_server_handler(
    State(state): State<AppState>,
    Json(payload): Json<DeployRequest>,
) -> ApiResult<Json<ProvisionResponse>> {
    let request = ProvisionRequest::new(payload.user, payload.device_id, payload.instance_name)?;
    let receipt = state.provisioning_service.destroy_server(request).await?;

    Ok(Json(ProvisionResponse::from(receipt)))
}

pub async fn request_status_handler(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<RequestStatusResponse>> {
    let request_id = RequestId::parse(request_id)?;
    let view = state.provisioning_service.find_request(&request_id).await?;

    Ok(Json(RequestStatusResponse::from(view)))
}
