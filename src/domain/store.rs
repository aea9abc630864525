//! Store trait and shared data types
//!
//! `LibraryStore` is the contract every backend implements. The persistent
//! (SeaORM) and in-memory implementations live in the infrastructure layer
//! and must be observably identical for every operation. Each lifecycle
//! method is an atomic check-and-mutate: the SQL path uses one transaction,
//! the in-memory path holds one process-wide lock for the whole sequence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Book record as exposed by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub shelf: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub publisher: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a book. `available_copies` defaults to `total_copies`,
/// which itself defaults to 1.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_copies: Option<i32>,
    pub available_copies: Option<i32>,
    pub shelf: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub publisher: Option<String>,
    pub cover_image: Option<String>,
}

/// Partial update for a book. Unspecified fields are preserved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub total_copies: Option<i32>,
    pub available_copies: Option<i32>,
    pub shelf: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub publisher: Option<String>,
    pub cover_image: Option<String>,
}

/// User account. The hash never leaves the backend in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
}

/// Input for creating a user (password already hashed by the caller)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// Partial update for a user
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
}

/// One step in a book-copy's custody history
#[derive(Debug, Clone, Serialize)]
pub struct CirculationRecord {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub action: String, // 'reserve', 'borrow', 'return'
    pub action_date: String,
    pub due_date: Option<String>,
    pub returned: bool,
    // Reserved column, never computed anywhere
    pub fine_amount: Option<f64>,
}

impl CirculationRecord {
    /// An active record holds or claims a copy: reserve or borrow, not yet returned
    pub fn is_active(&self) -> bool {
        !self.returned && (self.action == "reserve" || self.action == "borrow")
    }
}

/// Circulation record joined with user and book info for listings
#[derive(Debug, Clone, Serialize)]
pub struct CirculationWithDetails {
    #[serde(flatten)]
    pub record: CirculationRecord,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A currently borrowed book as shown on the patron's own list
#[derive(Debug, Clone, Serialize)]
pub struct BorrowedBook {
    pub id: i32,
    pub action_date: String,
    pub due_date: Option<String>,
    pub fine_amount: Option<f64>,
    pub book_id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub cover_image: Option<String>,
}

/// Notification row. `user_id = None` is a broadcast visible to everyone.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i32,
    pub user_id: Option<i32>,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Dashboard summary counters
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_books: i64,
    pub available_books: i64,
    pub borrowed_books: i64,
    pub notifications: Vec<Notification>,
}

/// The authenticated caller, derived from a verified credential.
/// This is the single authorization capability: role checks go through
/// `require_admin`, never through ad hoc token decoding in handlers.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: i32,
    pub username: String,
    pub role: String,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Patrons may only act on their own resources; admins on anyone's
    pub fn require_self_or_admin(&self, user_id: i32) -> Result<(), DomainError> {
        if self.id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "You are not authorized to access this resource".to_string(),
            ))
        }
    }
}

/// Result of a lifecycle transition: the affected record plus the
/// notifications written in the same atomic unit. The caller may push the
/// notifications to a live channel after commit.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub record: CirculationRecord,
    pub notifications: Vec<Notification>,
}

/// Contract for both backends. Lifecycle methods apply the full
/// guard-check + mutation + notification sequence atomically and return
/// guard failures as definite rejections, never partial state.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    // Catalog
    async fn list_books(&self) -> Result<Vec<Book>, DomainError>;
    async fn get_book(&self, id: i32) -> Result<Book, DomainError>;
    async fn create_book(&self, new: NewBook) -> Result<Book, DomainError>;
    async fn update_book(&self, id: i32, patch: BookPatch) -> Result<Book, DomainError>;
    async fn delete_book(&self, id: i32) -> Result<(), DomainError>;

    // Identity
    async fn list_users(&self) -> Result<Vec<User>, DomainError>;
    async fn get_user(&self, id: i32) -> Result<User, DomainError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DomainError>;
    async fn create_user(&self, new: NewUser) -> Result<User, DomainError>;
    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<User, DomainError>;
    async fn delete_user(&self, id: i32) -> Result<(), DomainError>;

    // Circulation lifecycle
    async fn reserve(
        &self,
        user_id: i32,
        book_id: i32,
        due_date: String,
    ) -> Result<TransitionOutcome, DomainError>;
    async fn approve(&self, circulation_id: i32) -> Result<TransitionOutcome, DomainError>;
    async fn cancel(
        &self,
        circulation_id: i32,
        actor: &Actor,
    ) -> Result<TransitionOutcome, DomainError>;
    async fn return_book(
        &self,
        user_id: i32,
        book_id: i32,
    ) -> Result<TransitionOutcome, DomainError>;
    async fn list_circulation(&self) -> Result<Vec<CirculationWithDetails>, DomainError>;
    async fn list_circulation_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<CirculationWithDetails>, DomainError>;
    async fn list_borrowed(&self, user_id: i32) -> Result<Vec<BorrowedBook>, DomainError>;

    // Notifications
    async fn append_notification(
        &self,
        user_id: Option<i32>,
        title: &str,
        message: &str,
    ) -> Result<Notification, DomainError>;
    async fn notifications_for_user(&self, user_id: i32)
        -> Result<Vec<Notification>, DomainError>;

    // Dashboard
    async fn dashboard_stats(&self) -> Result<DashboardStats, DomainError>;
}

impl NewBook {
    /// Check required fields and resolve copy counts
    /// (`total_copies` defaults to 1, `available_copies` to `total_copies`)
    pub fn validate(&self) -> Result<(i32, i32), DomainError> {
        if self.title.trim().is_empty()
            || self.author.trim().is_empty()
            || self.isbn.trim().is_empty()
        {
            return Err(DomainError::InvalidInput(
                "Title, author and ISBN are required".to_string(),
            ));
        }
        let total = self.total_copies.unwrap_or(1);
        let available = self.available_copies.unwrap_or(total);
        validate_copy_bounds(total, available)?;
        Ok((total, available))
    }
}

/// Invariant: 1 <= total and 0 <= available <= total
pub fn validate_copy_bounds(total: i32, available: i32) -> Result<(), DomainError> {
    if total < 1 {
        return Err(DomainError::InvalidInput(
            "total_copies must be at least 1".to_string(),
        ));
    }
    if available < 0 || available > total {
        return Err(DomainError::InvalidInput(
            "available_copies must be between 0 and total_copies".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_role(role: &str) -> Result<(), DomainError> {
    match role {
        "admin" | "patron" => Ok(()),
        other => Err(DomainError::InvalidInput(format!(
            "Unknown role: {}",
            other
        ))),
    }
}

// Notification texts used by lifecycle transitions. Both backends go through
// these so their observable output stays identical.

pub fn reserve_user_notice(title: &str) -> (String, String) {
    (
        "Book Reserved".to_string(),
        format!(
            "You have reserved \"{}\". Please wait for admin approval.",
            title
        ),
    )
}

pub fn reserve_admin_notice(username: &str, title: &str) -> (String, String) {
    (
        "New Reservation".to_string(),
        format!(
            "{} has reserved \"{}\" and is waiting for approval.",
            username, title
        ),
    )
}

pub fn approve_notice(title: &str, due_date: &str) -> (String, String) {
    (
        "Reservation Approved".to_string(),
        format!(
            "Your reservation for \"{}\" has been approved. Due date: {}",
            title, due_date
        ),
    )
}

pub fn cancel_notice(title: &str) -> (String, String) {
    (
        "Reservation Canceled".to_string(),
        format!(
            "Your reservation for \"{}\" has been canceled by an administrator.",
            title
        ),
    )
}

pub fn return_admin_notice(username: &str, title: &str) -> (String, String) {
    (
        "Book Returned".to_string(),
        format!("{} has returned \"{}\".", username, title),
    )
}
