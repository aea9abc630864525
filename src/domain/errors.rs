//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.
//! The API layer maps them to HTTP status codes.

use std::fmt;

#[derive(Debug)]
pub enum DomainError {
    /// Missing or invalid credential
    Unauthenticated(String),
    /// Authenticated but role/ownership insufficient
    Forbidden(String),
    /// Book, user or circulation record absent
    NotFound(String),
    /// Guard rejection: duplicate ISBN/username/email, no copies available,
    /// already-active reservation, last-admin deletion
    Conflict(String),
    /// Missing required field or unparsable value
    InvalidInput(String),
    /// Storage unreachable, timeout or failed transaction. The caller sees
    /// no partial state; mode fallback happens at process start, never here.
    Infrastructure(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            DomainError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DomainError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DomainError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            DomainError::Infrastructure(msg) => write!(f, "Infrastructure error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
