use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_response, ApiError};
use crate::auth::{hash_password, Claims};
use crate::domain::{DomainError, NewUser, UserPatch};
use crate::infrastructure::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Value>, ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    let users = state.store.list_users().await.map_err(error_response)?;
    Ok(Json(json!({ "users": users })))
}

pub async fn get_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    claims
        .actor()
        .require_self_or_admin(id)
        .map_err(error_response)?;

    let user = state.store.get_user(id).await.map_err(error_response)?;
    Ok(Json(json!({ "user": user })))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    username: String,
    email: String,
    password: String,
    role: Option<String>,
}

pub async fn create_user(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(error_response(DomainError::InvalidInput(
            "Please provide username, email and password".to_string(),
        )));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| error_response(DomainError::Infrastructure(e)))?;

    let user = state
        .store
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            role: payload.role.unwrap_or_else(|| "patron".to_string()),
        })
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User added successfully",
            "user": user,
        })),
    ))
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

pub async fn update_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    let password_hash = match payload.password {
        Some(password) => Some(
            hash_password(&password)
                .map_err(|e| error_response(DomainError::Infrastructure(e)))?,
        ),
        None => None,
    };

    let user = state
        .store
        .update_user(
            id,
            UserPatch {
                username: payload.username,
                email: payload.email,
                password_hash,
                role: payload.role,
            },
        )
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "message": "User updated successfully",
        "user": user,
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    claims.actor().require_admin().map_err(error_response)?;

    state.store.delete_user(id).await.map_err(error_response)?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
