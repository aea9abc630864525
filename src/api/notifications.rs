use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::{error_response, ApiError};
use crate::auth::Claims;
use crate::infrastructure::AppState;

/// Notifications addressed to the user plus broadcasts, newest first
pub async fn list_for_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    claims
        .actor()
        .require_self_or_admin(user_id)
        .map_err(error_response)?;

    let notifications = state
        .store
        .notifications_for_user(user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "notifications": notifications })))
}
