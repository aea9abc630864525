pub mod auth;
pub mod books;
pub mod circulation;
pub mod dashboard;
pub mod health;
pub mod notifications;
pub mod users;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::domain::DomainError;
use crate::infrastructure::AppState;

pub type ApiError = (StatusCode, Json<Value>);

/// Map a domain failure to an HTTP response. Guard rejections keep their
/// human-readable message; infrastructure failures are logged and surfaced
/// as a plain 500.
pub fn error_response(e: DomainError) -> ApiError {
    let (status, message) = match &e {
        DomainError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        DomainError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        DomainError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        DomainError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        DomainError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        DomainError::Infrastructure(msg) => {
            tracing::error!("storage failure: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message })))
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/users/login", post(auth::login))
        .route("/users/register", post(auth::register))
        // Dashboard
        .route("/dashboard/stats", get(dashboard::stats))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Circulation lifecycle
        .route("/circulation/reserve", post(circulation::reserve))
        // Legacy alias: borrowing without approval is disallowed, a borrow
        // request lands as a reservation
        .route("/circulation/borrow", post(circulation::reserve))
        .route("/circulation/approve", post(circulation::approve))
        .route("/circulation/cancel", post(circulation::cancel))
        .route("/circulation/return", post(circulation::return_book))
        .route("/circulation", get(circulation::list_circulation))
        .route(
            "/circulation/user/:id",
            get(circulation::list_user_circulation),
        )
        .route("/circulation/borrowed", get(circulation::list_borrowed))
        // Notifications
        .route(
            "/notifications/user/:id",
            get(notifications::list_for_user),
        )
        .with_state(state)
}
