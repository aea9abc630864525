//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no SeaORM, no Axum).
//! Only trait definitions, shared data types and domain error types.

pub mod errors;
pub mod store;

pub use errors::DomainError;
pub use store::*;
