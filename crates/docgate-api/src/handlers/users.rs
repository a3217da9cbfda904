//! Plan change and upload accounting handlers.

use axum::extract::{Path, State};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Serialize};

use docgate_models::PlanTier;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanChangeRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChangeResponse {
    pub user_id: String,
    pub plan: PlanTier,
}

/// Apply a plan change. Unknown plan names are rejected.
pub async fn update_plan(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<PlanChangeRequest>, JsonRejection>,
) -> ApiResult<Json<PlanChangeResponse>> {
    let Json(request) = payload?;
    let plan = request
        .plan
        .parse::<PlanTier>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let account = state.quota.change_plan(&user_id, plan).await?;
    Ok(Json(PlanChangeResponse {
        user_id: account.user_id,
        plan: account.plan,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecordedResponse {
    pub user_id: String,
    pub upload_count: u32,
}

/// Count one accepted upload.
pub async fn record_upload(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UploadRecordedResponse>> {
    let upload_count = state.quota.record_upload(&user_id).await?;
    Ok(Json(UploadRecordedResponse {
        user_id: user_id.trim().to_string(),
        upload_count,
    }))
}
