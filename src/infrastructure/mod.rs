pub mod memory_store;
pub mod sql_store;
pub mod state;

pub use memory_store::MemoryStore;
pub use sql_store::SqlStore;
pub use state::AppState;
