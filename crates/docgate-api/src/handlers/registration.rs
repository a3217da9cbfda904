//! Registration event handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::client_ip::ClientAddress;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    /// Overrides the header-derived address, for callers relaying events.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub client_ip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub user_id: String,
    pub registration_ip: String,
    pub created: bool,
}

/// Record a registration. 201 on first delivery, 200 on replay.
pub async fn register_user(
    State(state): State<AppState>,
    ClientAddress(header_ip): ClientAddress,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegistrationResponse>)> {
    let Json(request) = payload?;
    request.validate()?;

    let raw_ip = request
        .client_ip
        .filter(|ip| !ip.trim().is_empty())
        .or(header_ip);
    debug!(user_id = %request.user_id, raw_ip = ?raw_ip, "Recording registration");

    let receipt = state
        .quota
        .record_registration(&request.user_id, raw_ip.as_deref())
        .await?;

    let status = if receipt.created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(RegistrationResponse {
            created: receipt.created(),
            registration_ip: receipt.registration_ip.as_str().to_string(),
            user_id: receipt.user_id,
        }),
    ))
}
