//! Quota check handlers.

use axum::extract::{Path, State};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use docgate_models::QuotaCheck;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCheckRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

/// Check quota for the user named in the body.
pub async fn check_quota(
    State(state): State<AppState>,
    payload: Result<Json<QuotaCheckRequest>, JsonRejection>,
) -> ApiResult<Json<QuotaCheck>> {
    let Json(request) = payload?;
    request.validate()?;
    Ok(Json(state.quota.check_quota(&request.user_id).await?))
}

/// Check quota for the user named in the path.
pub async fn get_user_quota(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<QuotaCheck>> {
    Ok(Json(state.quota.check_quota(&user_id).await?))
}
