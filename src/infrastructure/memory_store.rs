//! In-memory implementation of `LibraryStore`
//!
//! Standalone fallback used when the database is unreachable at process
//! start. Not a cache: it is never reconciled with the persistent store,
//! and an operator must not mix modes within one process lifetime.
//!
//! Without a backing transaction manager, atomicity comes from one
//! process-wide advisory lock: every operation takes the mutex for the
//! whole check-and-mutate sequence, so two requests can never both pass a
//! guard and then both apply effects.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    self, Actor, Book, BookPatch, BorrowedBook, CirculationRecord, CirculationWithDetails,
    DashboardStats, DomainError, LibraryStore, NewBook, NewUser, Notification, TransitionOutcome,
    User, UserPatch,
};

#[derive(Default)]
struct MemoryState {
    books: Vec<Book>,
    users: Vec<User>,
    circulation: Vec<CirculationRecord>,
    notifications: Vec<Notification>,
    next_book_id: i32,
    next_user_id: i32,
    next_circulation_id: i32,
    next_notification_id: i32,
}

pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                next_book_id: 1,
                next_user_id: 1,
                next_circulation_id: 1,
                next_notification_id: 1,
                ..Default::default()
            }),
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl MemoryState {
    fn push_notification(
        &mut self,
        user_id: Option<i32>,
        title: String,
        message: String,
    ) -> Notification {
        let note = Notification {
            id: self.next_notification_id,
            user_id,
            title,
            message,
            is_read: false,
            created_at: now(),
        };
        self.next_notification_id += 1;
        self.notifications.push(note.clone());
        note
    }

    fn admin_ids(&self) -> Vec<i32> {
        self.users
            .iter()
            .filter(|u| u.role == "admin")
            .map(|u| u.id)
            .collect()
    }

    fn book(&self, id: i32) -> Result<&Book, DomainError> {
        self.books
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))
    }

    fn user(&self, id: i32) -> Result<&User, DomainError> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    // ---- Catalog ----

    async fn list_books(&self) -> Result<Vec<Book>, DomainError> {
        let state = self.inner.lock().await;
        let mut books = state.books.clone();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    async fn get_book(&self, id: i32) -> Result<Book, DomainError> {
        let state = self.inner.lock().await;
        state.book(id).cloned()
    }

    async fn create_book(&self, new: NewBook) -> Result<Book, DomainError> {
        let (total, available) = new.validate()?;

        let mut state = self.inner.lock().await;
        if state.books.iter().any(|b| b.isbn == new.isbn.trim()) {
            return Err(DomainError::Conflict(
                "A book with this ISBN already exists".to_string(),
            ));
        }

        let book = Book {
            id: state.next_book_id,
            title: new.title,
            author: new.author,
            isbn: new.isbn.trim().to_owned(),
            total_copies: total,
            available_copies: available,
            shelf: new.shelf,
            category: new.category,
            description: new.description,
            published_year: new.published_year,
            publisher: new.publisher,
            cover_image: new.cover_image,
            created_at: now(),
            updated_at: now(),
        };
        state.next_book_id += 1;
        state.books.push(book.clone());
        Ok(book)
    }

    async fn update_book(&self, id: i32, patch: BookPatch) -> Result<Book, DomainError> {
        let mut state = self.inner.lock().await;
        state.book(id)?;

        if let Some(isbn) = &patch.isbn {
            if state
                .books
                .iter()
                .any(|b| b.id != id && b.isbn == isbn.trim())
            {
                return Err(DomainError::Conflict(
                    "A book with this ISBN already exists".to_string(),
                ));
            }
        }

        let book = state
            .books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;

        let total = patch.total_copies.unwrap_or(book.total_copies);
        let available = patch.available_copies.unwrap_or(book.available_copies);
        domain::validate_copy_bounds(total, available)?;

        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(author) = patch.author {
            book.author = author;
        }
        if let Some(isbn) = patch.isbn {
            book.isbn = isbn.trim().to_owned();
        }
        book.total_copies = total;
        book.available_copies = available;
        if let Some(shelf) = patch.shelf {
            book.shelf = Some(shelf);
        }
        if let Some(category) = patch.category {
            book.category = Some(category);
        }
        if let Some(description) = patch.description {
            book.description = Some(description);
        }
        if let Some(published_year) = patch.published_year {
            book.published_year = Some(published_year);
        }
        if let Some(publisher) = patch.publisher {
            book.publisher = Some(publisher);
        }
        if let Some(cover_image) = patch.cover_image {
            book.cover_image = Some(cover_image);
        }
        book.updated_at = now();

        Ok(book.clone())
    }

    async fn delete_book(&self, id: i32) -> Result<(), DomainError> {
        let mut state = self.inner.lock().await;
        state.book(id)?;

        let borrowed = state
            .circulation
            .iter()
            .any(|r| r.book_id == id && r.action == "borrow" && !r.returned);
        if borrowed {
            return Err(DomainError::Conflict(
                "Cannot delete a book that is currently borrowed".to_string(),
            ));
        }

        state.books.retain(|b| b.id != id);
        // Same as the schema's ON DELETE CASCADE
        state.circulation.retain(|r| r.book_id != id);
        Ok(())
    }

    // ---- Identity ----

    async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        let state = self.inner.lock().await;
        Ok(state.users.clone())
    }

    async fn get_user(&self, id: i32) -> Result<User, DomainError> {
        let state = self.inner.lock().await;
        state.user(id).cloned()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let state = self.inner.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, DomainError> {
        domain::validate_role(&new.role)?;

        let mut state = self.inner.lock().await;
        if state
            .users
            .iter()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            return Err(DomainError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        let user = User {
            id: state.next_user_id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now(),
        };
        state.next_user_id += 1;
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<User, DomainError> {
        let mut state = self.inner.lock().await;
        state.user(id)?;

        if let Some(role) = &patch.role {
            domain::validate_role(role)?;
        }

        if patch.username.is_some() || patch.email.is_some() {
            let duplicate = state.users.iter().any(|u| {
                u.id != id
                    && (patch.username.as_deref() == Some(u.username.as_str())
                        || patch.email.as_deref() == Some(u.email.as_str()))
            });
            if duplicate {
                return Err(DomainError::Conflict(
                    "Username or email already exists".to_string(),
                ));
            }
        }

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))?;

        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }

        Ok(user.clone())
    }

    async fn delete_user(&self, id: i32) -> Result<(), DomainError> {
        let mut state = self.inner.lock().await;
        let user = state.user(id)?;

        if user.role == "admin" {
            let admin_count = state.users.iter().filter(|u| u.role == "admin").count();
            if admin_count <= 1 {
                return Err(DomainError::Conflict(
                    "Cannot delete the last admin user".to_string(),
                ));
            }
        }

        state.users.retain(|u| u.id != id);
        // Same as the schema's ON DELETE CASCADE
        state.circulation.retain(|r| r.user_id != id);
        Ok(())
    }

    // ---- Circulation lifecycle ----

    async fn reserve(
        &self,
        user_id: i32,
        book_id: i32,
        due_date: String,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut state = self.inner.lock().await;

        let book = state.book(book_id)?;
        if book.available_copies <= 0 {
            return Err(DomainError::Conflict(
                "No available copies of this book".to_string(),
            ));
        }
        let book_title = book.title.clone();

        let already_active = state
            .circulation
            .iter()
            .any(|r| r.user_id == user_id && r.book_id == book_id && r.is_active());
        if already_active {
            return Err(DomainError::Conflict(
                "You already have this book reserved or borrowed".to_string(),
            ));
        }

        let username = state.user(user_id)?.username.clone();

        // Soft reservation: no copy decrement until approval
        let record = CirculationRecord {
            id: state.next_circulation_id,
            user_id,
            book_id,
            action: "reserve".to_string(),
            action_date: now(),
            due_date: Some(due_date),
            returned: false,
            fine_amount: None,
        };
        state.next_circulation_id += 1;
        state.circulation.push(record.clone());

        let mut notifications = Vec::new();
        let (title, message) = domain::reserve_user_notice(&book_title);
        notifications.push(state.push_notification(Some(user_id), title, message));
        for admin_id in state.admin_ids() {
            let (title, message) = domain::reserve_admin_notice(&username, &book_title);
            notifications.push(state.push_notification(Some(admin_id), title, message));
        }

        Ok(TransitionOutcome {
            record,
            notifications,
        })
    }

    async fn approve(&self, circulation_id: i32) -> Result<TransitionOutcome, DomainError> {
        let mut state = self.inner.lock().await;

        let record = state
            .circulation
            .iter()
            .find(|r| r.id == circulation_id && r.action == "reserve" && !r.returned)
            .cloned()
            .ok_or_else(|| DomainError::NotFound("Reservation not found".to_string()))?;

        let book = state.book(record.book_id)?;
        // Re-checked here: reservations are soft, copies may have run out since
        if book.available_copies <= 0 {
            return Err(DomainError::Conflict(
                "No available copies of this book anymore".to_string(),
            ));
        }
        let book_title = book.title.clone();
        let book_id = book.id;

        let updated = {
            let rec = state
                .circulation
                .iter_mut()
                .find(|r| r.id == circulation_id)
                .expect("record vanished while lock held");
            rec.action = "borrow".to_string();
            rec.clone()
        };

        let book = state
            .books
            .iter_mut()
            .find(|b| b.id == book_id)
            .expect("book vanished while lock held");
        book.available_copies -= 1;
        book.updated_at = now();

        let (title, message) =
            domain::approve_notice(&book_title, updated.due_date.as_deref().unwrap_or("not set"));
        let note = state.push_notification(Some(updated.user_id), title, message);

        Ok(TransitionOutcome {
            record: updated,
            notifications: vec![note],
        })
    }

    async fn cancel(
        &self,
        circulation_id: i32,
        actor: &Actor,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut state = self.inner.lock().await;

        let record = state
            .circulation
            .iter()
            .find(|r| r.id == circulation_id && r.action == "reserve" && !r.returned)
            .cloned()
            .ok_or_else(|| DomainError::NotFound("Reservation not found".to_string()))?;

        if record.user_id != actor.id && !actor.is_admin() {
            return Err(DomainError::Forbidden(
                "You are not authorized to cancel this reservation".to_string(),
            ));
        }

        let book_title = state.book(record.book_id)?.title.clone();

        state.circulation.retain(|r| r.id != circulation_id);

        // Only tell the owner when an admin cancels on their behalf
        let mut notifications = Vec::new();
        if actor.is_admin() && record.user_id != actor.id {
            let (title, message) = domain::cancel_notice(&book_title);
            notifications.push(state.push_notification(Some(record.user_id), title, message));
        }

        Ok(TransitionOutcome {
            record,
            notifications,
        })
    }

    async fn return_book(
        &self,
        user_id: i32,
        book_id: i32,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut state = self.inner.lock().await;

        let book_title = state.book(book_id)?.title.clone();
        let username = state.user(user_id)?.username.clone();

        let borrow_id = state
            .circulation
            .iter()
            .find(|r| {
                r.user_id == user_id && r.book_id == book_id && r.action == "borrow" && !r.returned
            })
            .map(|r| r.id)
            .ok_or_else(|| DomainError::Conflict("You have not borrowed this book".to_string()))?;

        let borrow = state
            .circulation
            .iter_mut()
            .find(|r| r.id == borrow_id)
            .expect("record vanished while lock held");
        borrow.returned = true;

        let return_record = CirculationRecord {
            id: state.next_circulation_id,
            user_id,
            book_id,
            action: "return".to_string(),
            action_date: now(),
            due_date: None,
            returned: false,
            fine_amount: None,
        };
        state.next_circulation_id += 1;
        state.circulation.push(return_record.clone());

        let book = state
            .books
            .iter_mut()
            .find(|b| b.id == book_id)
            .expect("book vanished while lock held");
        book.available_copies += 1;
        book.updated_at = now();

        let mut notifications = Vec::new();
        for admin_id in state.admin_ids() {
            let (title, message) = domain::return_admin_notice(&username, &book_title);
            notifications.push(state.push_notification(Some(admin_id), title, message));
        }

        Ok(TransitionOutcome {
            record: return_record,
            notifications,
        })
    }

    async fn list_circulation(&self) -> Result<Vec<CirculationWithDetails>, DomainError> {
        let state = self.inner.lock().await;
        let mut records: Vec<CirculationWithDetails> = state
            .circulation
            .iter()
            .map(|record| {
                let book = state.books.iter().find(|b| b.id == record.book_id);
                let username = state
                    .users
                    .iter()
                    .find(|u| u.id == record.user_id)
                    .map(|u| u.username.clone());
                CirculationWithDetails {
                    title: book
                        .map(|b| b.title.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    author: book
                        .map(|b| b.author.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    username,
                    record: record.clone(),
                }
            })
            .collect();
        records.sort_by(|a, b| {
            b.record
                .action_date
                .cmp(&a.record.action_date)
                .then(b.record.id.cmp(&a.record.id))
        });
        Ok(records)
    }

    async fn list_circulation_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<CirculationWithDetails>, DomainError> {
        let state = self.inner.lock().await;
        let mut records: Vec<CirculationWithDetails> = state
            .circulation
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|record| {
                let book = state.books.iter().find(|b| b.id == record.book_id);
                CirculationWithDetails {
                    title: book
                        .map(|b| b.title.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    author: book
                        .map(|b| b.author.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    username: None,
                    record: record.clone(),
                }
            })
            .collect();
        records.sort_by(|a, b| {
            b.record
                .action_date
                .cmp(&a.record.action_date)
                .then(b.record.id.cmp(&a.record.id))
        });
        Ok(records)
    }

    async fn list_borrowed(&self, user_id: i32) -> Result<Vec<BorrowedBook>, DomainError> {
        let state = self.inner.lock().await;
        let mut borrowed: Vec<BorrowedBook> = state
            .circulation
            .iter()
            .filter(|r| r.user_id == user_id && r.action == "borrow" && !r.returned)
            .filter_map(|record| {
                state
                    .books
                    .iter()
                    .find(|b| b.id == record.book_id)
                    .map(|book| BorrowedBook {
                        id: record.id,
                        action_date: record.action_date.clone(),
                        due_date: record.due_date.clone(),
                        fine_amount: record.fine_amount,
                        book_id: book.id,
                        title: book.title.clone(),
                        author: book.author.clone(),
                        isbn: book.isbn.clone(),
                        cover_image: book.cover_image.clone(),
                    })
            })
            .collect();
        borrowed.sort_by(|a, b| b.action_date.cmp(&a.action_date).then(b.id.cmp(&a.id)));
        Ok(borrowed)
    }

    // ---- Notifications ----

    async fn append_notification(
        &self,
        user_id: Option<i32>,
        title: &str,
        message: &str,
    ) -> Result<Notification, DomainError> {
        let mut state = self.inner.lock().await;
        Ok(state.push_notification(user_id, title.to_owned(), message.to_owned()))
    }

    async fn notifications_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<Notification>, DomainError> {
        let state = self.inner.lock().await;
        let mut rows: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id.is_none() || n.user_id == Some(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    // ---- Dashboard ----

    async fn dashboard_stats(&self) -> Result<DashboardStats, DomainError> {
        let state = self.inner.lock().await;
        let total_books = state.books.len() as i64;
        let available_books: i64 = state
            .books
            .iter()
            .map(|b| b.available_copies as i64)
            .sum();
        let borrowed_books = state
            .circulation
            .iter()
            .filter(|r| r.action == "borrow" && !r.returned)
            .count() as i64;

        let mut notifications = state.notifications.clone();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        notifications.truncate(5);

        Ok(DashboardStats {
            total_books,
            available_books,
            borrowed_books,
            notifications,
        })
    }
}
