//! End-to-end tests over the HTTP surface, backed by the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for oneshot

use bookwarden::infrastructure::{AppState, MemoryStore};
use bookwarden::seed::seed_demo_data;
use bookwarden::server::build_router;
use bookwarden::services::delivery::NoopDelivery;

async fn test_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    seed_demo_data(store.as_ref())
        .await
        .expect("Failed to seed demo data");
    build_router(AppState::new(store, Arc::new(NoopDelivery)))
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> (String, i32) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/login",
            None,
            json!({ "username": username, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    let id = body["user"]["id"].as_i64().unwrap() as i32;
    (token, id)
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;
    let response = app
        .oneshot(get_request("/api/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/login",
            None,
            json!({ "username": "admin", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid credentials");

    // Unknown user gets the same message, no username probing
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/login",
            None,
            json!({ "username": "nobody", "password": "password" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_register_then_login() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/register",
            None,
            json!({
                "username": "newuser",
                "email": "newuser@example.com",
                "password": "hunter2"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "patron");
    assert!(body["token"].as_str().is_some());
    // The hash never leaves the server
    assert!(body["user"].get("password_hash").is_none());

    login(&app, "newuser", "hunter2").await;
}

#[tokio::test]
async fn test_register_validates_required_fields() {
    let app = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/users/register",
            None,
            json!({ "username": "  ", "email": "x@example.com", "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_book_listing_is_public_but_writes_need_admin() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/api/books", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"].as_u64().unwrap(), 2);

    // No token
    let new_book = json!({
        "title": "Snow Crash",
        "author": "Neal Stephenson",
        "isbn": "9780553380958",
        "total_copies": 2
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/books", None, new_book.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Patron token
    let (patron_token, _) = login(&app, "user1", "password").await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/books",
            Some(&patron_token),
            new_book.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admin token
    let (admin_token, _) = login(&app, "admin", "password").await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/books",
            Some(&admin_token),
            new_book.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    // available_copies defaults to total_copies
    assert_eq!(body["book"]["available_copies"].as_i64().unwrap(), 2);

    // Same ISBN again
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/books",
            Some(&admin_token),
            new_book,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let app = test_app().await;
    let (admin_token, _) = login(&app, "admin", "password").await;
    let (patron_token, patron_id) = login(&app, "user1", "password").await;

    // Reserve without a due date: the server picks one two weeks out
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/circulation/reserve",
            Some(&patron_token),
            json!({ "book_id": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let circulation_id = body["circulation"]["id"].as_i64().unwrap() as i32;
    assert_eq!(body["circulation"]["action"], "reserve");
    assert!(body["due_date"].as_str().is_some());

    // A second reserve for the same book conflicts
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/circulation/reserve",
            Some(&patron_token),
            json!({ "book_id": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Approval is admin territory
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/circulation/approve",
            Some(&patron_token),
            json!({ "circulation_id": circulation_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/circulation/approve",
            Some(&admin_token),
            json!({ "circulation_id": circulation_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["circulation"]["action"], "borrow");

    // The borrowed list reflects the loan
    let response = app
        .clone()
        .oneshot(get_request("/api/circulation/borrowed", Some(&patron_token)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["borrowed"].as_array().unwrap().len(), 1);
    assert_eq!(body["borrowed"][0]["title"], "The Great Gatsby");

    // Return it
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/circulation/return",
            Some(&patron_token),
            json!({ "book_id": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Returning again fails, nothing is out
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/circulation/return",
            Some(&patron_token),
            json!({ "book_id": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "You have not borrowed this book");

    // The patron saw the whole story in their notifications
    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/api/notifications/user/{}", patron_id),
            Some(&patron_token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let titles: Vec<&str> = body["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["title"].as_str())
        .collect();
    assert!(titles.contains(&"Book Reserved"));
    assert!(titles.contains(&"Reservation Approved"));
}

#[tokio::test]
async fn test_borrow_endpoint_is_a_reserve_alias() {
    let app = test_app().await;
    let (patron_token, _) = login(&app, "user1", "password").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/circulation/borrow",
            Some(&patron_token),
            json!({ "book_id": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["circulation"]["action"], "reserve");
}

#[tokio::test]
async fn test_reserve_accepts_date_only_due_date() {
    let app = test_app().await;
    let (patron_token, _) = login(&app, "user1", "password").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/circulation/reserve",
            Some(&patron_token),
            json!({ "book_id": 1, "due_date": "2030-01-15" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    // Taken as midnight UTC
    assert!(body["due_date"]
        .as_str()
        .unwrap()
        .starts_with("2030-01-15T00:00:00"));
}

#[tokio::test]
async fn test_reserve_rejects_malformed_due_date() {
    let app = test_app().await;
    let (patron_token, _) = login(&app, "user1", "password").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/circulation/reserve",
            Some(&patron_token),
            json!({ "book_id": 1, "due_date": "next tuesday" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_circulation_listings_are_scoped() {
    let app = test_app().await;
    let (admin_token, _) = login(&app, "admin", "password").await;
    let (patron_token, patron_id) = login(&app, "user1", "password").await;

    // Global listing is admin-only
    let response = app
        .clone()
        .oneshot(get_request("/api/circulation", Some(&patron_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(get_request("/api/circulation", Some(&admin_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A patron sees their own history but not someone else's
    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/api/circulation/user/{}", patron_id),
            Some(&patron_token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(
            "/api/circulation/user/1",
            Some(&patron_token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admins can read anyone's
    let response = app
        .oneshot(get_request(
            &format!("/api/circulation/user/{}", patron_id),
            Some(&admin_token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_notifications_require_self_or_admin() {
    let app = test_app().await;
    let (patron_token, _) = login(&app, "user1", "password").await;

    let response = app
        .oneshot(get_request("/api/notifications/user/1", Some(&patron_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_management_is_admin_only() {
    let app = test_app().await;
    let (admin_token, admin_id) = login(&app, "admin", "password").await;
    let (patron_token, _) = login(&app, "user1", "password").await;

    let response = app
        .clone()
        .oneshot(get_request("/api/users", Some(&patron_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(get_request("/api/users", Some(&admin_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    // The only admin cannot be removed
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/users/{}", admin_id))
                .header("Authorization", format!("Bearer {}", admin_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Cannot delete the last admin user");
}

#[tokio::test]
async fn test_dashboard_stats_shape() {
    let app = test_app().await;
    let response = app
        .oneshot(get_request("/api/dashboard/stats", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totalBooks"].as_u64().unwrap(), 2);
    // 5 Gatsby + 3 Mockingbird copies, nothing out yet
    assert_eq!(body["availableBooks"].as_u64().unwrap(), 8);
    assert_eq!(body["borrowedBooks"].as_u64().unwrap(), 0);
    assert!(body["notifications"].is_array());
}

#[tokio::test]
async fn test_missing_book_is_404() {
    let app = test_app().await;
    let response = app
        .oneshot(get_request("/api/books/999", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Book not found");
}
