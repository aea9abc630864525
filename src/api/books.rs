use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{error_response, ApiError};
use crate::auth::Claims;
use crate::domain::{BookPatch, NewBook};
use crate::infrastructure::AppState;

#[utoipa::path(
    get,
    path = "/api/books",
    responses(
        (status = 200, description = "All books ordered by title")
    )
)]
pub async fn list_books(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let books = state.store.list_books().await.map_err(error_response)?;
    Ok(Json(json!({
        "books": books,
        "total": books.len(),
    })))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let book = state.store.get_book(id).await.map_err(error_response)?;
    Ok(Json(json!({ "book": book })))
}

#[utoipa::path(
    post,
    path = "/api/books",
    responses(
        (status = 201, description = "Book created"),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "Duplicate ISBN")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<NewBook>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    let book = state
        .store
        .create_book(payload)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Book created successfully",
            "book": book,
        })),
    ))
}

pub async fn update_book(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<BookPatch>,
) -> Result<Json<Value>, ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    let book = state
        .store
        .update_book(id, payload)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "message": "Book updated successfully",
        "book": book,
    })))
}

pub async fn delete_book(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    state.store.delete_book(id).await.map_err(error_response)?;
    Ok(Json(json!({ "message": "Book deleted successfully" })))
}
