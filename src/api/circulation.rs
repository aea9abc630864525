use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_response, ApiError};
use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::circulation;

#[derive(Deserialize)]
pub struct ReserveRequest {
    book_id: i32,
    due_date: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/circulation/reserve",
    responses(
        (status = 201, description = "Book reserved, waiting for admin approval"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copies available or already reserved/borrowed")
    )
)]
pub async fn reserve(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let actor = claims.actor();
    let record = circulation::reserve(&state, &actor, payload.book_id, payload.due_date)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Book reserved successfully. Waiting for admin approval.",
            "circulation": record,
            "due_date": record.due_date,
        })),
    ))
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    circulation_id: i32,
}

pub async fn approve(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<ApproveRequest>,
) -> Result<Json<Value>, ApiError> {
    let actor = claims.actor();
    let record = circulation::approve(&state, &actor, payload.circulation_id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "message": "Reservation approved successfully",
        "circulation": record,
    })))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    circulation_id: i32,
}

pub async fn cancel(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Value>, ApiError> {
    let actor = claims.actor();
    let record = circulation::cancel(&state, &actor, payload.circulation_id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "message": "Reservation canceled successfully",
        "circulation_id": record.id,
    })))
}

#[derive(Deserialize)]
pub struct ReturnRequest {
    book_id: i32,
}

pub async fn return_book(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<ReturnRequest>,
) -> Result<Json<Value>, ApiError> {
    let actor = claims.actor();
    let record = circulation::return_book(&state, &actor, payload.book_id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "message": "Book returned successfully",
        "circulation": record,
    })))
}

pub async fn list_circulation(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Value>, ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    let records = state
        .store
        .list_circulation()
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "circulation": records })))
}

pub async fn list_user_circulation(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    claims
        .actor()
        .require_self_or_admin(user_id)
        .map_err(error_response)?;

    let records = state
        .store
        .list_circulation_for_user(user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "circulation": records })))
}

pub async fn list_borrowed(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Value>, ApiError> {
    let actor = claims.actor();
    let borrowed = state
        .store
        .list_borrowed(actor.id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "borrowed": borrowed })))
}
