//! Application state containing the selected store and shared resources

use std::sync::Arc;

use crate::domain::LibraryStore;
use crate::services::delivery::NotificationDelivery;

/// Application state shared across all handlers. The store is chosen once
/// at startup (database or in-memory) and never swapped afterwards.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LibraryStore>,
    pub delivery: Arc<dyn NotificationDelivery>,
}

impl AppState {
    pub fn new(store: Arc<dyn LibraryStore>, delivery: Arc<dyn NotificationDelivery>) -> Self {
        Self { store, delivery }
    }
}
