use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use bookwarden::api_docs::ApiDoc;
use bookwarden::config::{Config, StorageMode};
use bookwarden::domain::LibraryStore;
use bookwarden::infrastructure::{AppState, MemoryStore, SqlStore};
use bookwarden::services::delivery::{NoopDelivery, NotificationDelivery, WebhookDelivery};
use bookwarden::{db, seed, server};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookwarden=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Storage mode is decided exactly once, here. A database failure after
    // this point is an infrastructure error, never a per-request fallback.
    let mut memory_mode = config.storage_mode == StorageMode::Memory;
    let store: Arc<dyn LibraryStore> = if memory_mode {
        tracing::info!("Running on in-memory storage (STORAGE_MODE=memory)");
        Arc::new(MemoryStore::new())
    } else {
        match db::init_db(&config.database_url).await {
            Ok(db) => {
                tracing::info!("Database connected: {}", config.database_url);
                Arc::new(SqlStore::new(db))
            }
            Err(e) => {
                tracing::error!("Database connection error: {}", e);
                tracing::warn!(
                    "Using in-memory storage as a fallback for this process lifetime"
                );
                memory_mode = true;
                Arc::new(MemoryStore::new())
            }
        }
    };

    // In-memory mode always starts empty, so it gets the demo accounts;
    // a database is only seeded on request
    if memory_mode || std::env::var("SEED_DEMO").is_ok() {
        tracing::info!("Seeding demo data...");
        if let Err(e) = seed::seed_demo_data(store.as_ref()).await {
            tracing::error!("Failed to seed data: {}", e);
        }
    }

    let delivery: Arc<dyn NotificationDelivery> = match &config.push_webhook_url {
        Some(url) => {
            tracing::info!("Push delivery enabled: {}", url);
            Arc::new(WebhookDelivery::new(url.clone()))
        }
        None => Arc::new(NoopDelivery),
    };

    let state = AppState::new(store, delivery);

    let app = server::build_router(state)
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // Port retry: take the next free port if the preferred one is busy
    let port = server::find_available_port(config.port).expect("Failed to find available port");
    if port != config.port {
        tracing::warn!(
            "Preferred port {} was not available, using port {} instead",
            config.port,
            port
        );
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Bookwarden server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
