use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::{error_response, ApiError};
use crate::infrastructure::AppState;

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Totals and recent notifications")
    )
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state
        .store
        .dashboard_stats()
        .await
        .map_err(error_response)?;
    Ok(Json(json!(stats)))
}
