//! Operator view of an address.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use docgate_quota::IpSignal;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpReputationResponse {
    pub ip: String,
    #[serde(flatten)]
    pub signal: IpSignal,
}

pub async fn get_ip_reputation(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> ApiResult<Json<IpReputationResponse>> {
    let (ip, signal) = state.quota.ip_reputation(&ip).await?;
    Ok(Json(IpReputationResponse {
        ip: ip.as_str().to_string(),
        signal,
    }))
}
