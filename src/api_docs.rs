use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::dashboard::stats,
        api::books::list_books,
        api::books::create_book,
        api::auth::login,
        api::circulation::reserve,
        // Add other endpoints here as we document them
    ),
    tags(
        (name = "bookwarden", description = "Bookwarden library management API")
    )
)]
pub struct ApiDoc;
