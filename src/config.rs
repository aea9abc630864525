use std::env;

/// Storage mode, fixed for the whole process lifetime. Never switched
/// per-request: mixing modes mid-lifetime risks silent data divergence.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageMode {
    /// Use the database; fall back to Memory only if the boot health check fails
    Database,
    /// Run entirely on the in-memory store
    Memory,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub storage_mode: StorageMode,
    /// Optional live-channel endpoint for best-effort notification pushes
    pub push_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://bookwarden.db?mode=rwc".to_string());

        let storage_mode = match env::var("STORAGE_MODE").as_deref() {
            Ok("memory") => StorageMode::Memory,
            _ => StorageMode::Database,
        };

        Self {
            database_url,
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            storage_mode,
            push_webhook_url: env::var("PUSH_WEBHOOK_URL").ok(),
        }
    }
}
