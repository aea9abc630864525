use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_response, ApiError};
use crate::auth::{create_jwt, hash_password};
use crate::domain::{DomainError, NewUser};
use crate::infrastructure::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/api/users/login",
    responses(
        (status = 200, description = "Login successful, token issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::info!("Login attempt for user: {}", payload.username);

    let invalid = || {
        error_response(DomainError::Unauthenticated(
            "Invalid credentials".to_string(),
        ))
    };

    let user = state
        .store
        .find_user_by_username(&payload.username)
        .await
        .map_err(error_response)?
        .ok_or_else(invalid)?;

    let verified = crate::auth::verify_password(&payload.password, &user.password_hash)
        .unwrap_or(false);
    if !verified {
        tracing::warn!("Password verification failed for user: {}", user.username);
        return Err(invalid());
    }

    let token = create_jwt(user.id, &user.username, &user.role)
        .map_err(|e| error_response(DomainError::Infrastructure(e)))?;

    Ok(Json(json!({
        "message": "Login successful",
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "role": user.role,
        },
        "token": token,
    })))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    role: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
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

    let token = create_jwt(user.id, &user.username, &user.role)
        .map_err(|e| error_response(DomainError::Infrastructure(e)))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": {
                "id": user.id,
                "username": user.username,
                "email": user.email,
                "role": user.role,
            },
            "token": token,
        })),
    ))
}
