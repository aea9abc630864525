//! SeaORM-backed implementation of `LibraryStore`
//!
//! Every lifecycle transition runs its whole guard-check + mutation +
//! notification sequence inside one transaction. A guard failure returns
//! early, the transaction is dropped and rolled back, and the caller sees
//! no partial state.

use async_trait::async_trait;
use sea_orm::*;
use std::collections::HashMap;

use crate::domain::{
    self, Actor, BookPatch, BorrowedBook, CirculationWithDetails, DashboardStats, DomainError,
    LibraryStore, NewBook, NewUser, TransitionOutcome, UserPatch,
};
use crate::models::book::{self, Entity as Book};
use crate::models::circulation::{self, Entity as Circulation};
use crate::models::notification::{self, Entity as Notification};
use crate::models::user::{self, Entity as User};

// SeaORM failures surface as infrastructure errors
impl From<DbErr> for DomainError {
    fn from(e: DbErr) -> Self {
        DomainError::Infrastructure(e.to_string())
    }
}

pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn insert_notification<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<i32>,
    title: &str,
    message: &str,
) -> Result<domain::Notification, DomainError> {
    let row = notification::ActiveModel {
        user_id: Set(user_id),
        title: Set(title.to_owned()),
        message: Set(message.to_owned()),
        is_read: Set(false),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(row.into())
}

/// Active reserve-or-borrow record for a (user, book) pair
fn active_record_condition(user_id: i32, book_id: i32) -> Condition {
    Condition::all()
        .add(circulation::Column::UserId.eq(user_id))
        .add(circulation::Column::BookId.eq(book_id))
        .add(
            Condition::any()
                .add(circulation::Column::Action.eq("reserve"))
                .add(circulation::Column::Action.eq("borrow")),
        )
        .add(circulation::Column::Returned.eq(false))
}

#[async_trait]
impl LibraryStore for SqlStore {
    // ---- Catalog ----

    async fn list_books(&self) -> Result<Vec<domain::Book>, DomainError> {
        let books = Book::find()
            .order_by_asc(book::Column::Title)
            .all(&self.db)
            .await?;
        Ok(books.into_iter().map(domain::Book::from).collect())
    }

    async fn get_book(&self, id: i32) -> Result<domain::Book, DomainError> {
        let model = Book::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;
        Ok(model.into())
    }

    async fn create_book(&self, new: NewBook) -> Result<domain::Book, DomainError> {
        let (total, available) = new.validate()?;

        let existing = Book::find()
            .filter(book::Column::Isbn.eq(new.isbn.trim()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(DomainError::Conflict(
                "A book with this ISBN already exists".to_string(),
            ));
        }

        let model = book::ActiveModel {
            title: Set(new.title),
            author: Set(new.author),
            isbn: Set(new.isbn.trim().to_owned()),
            total_copies: Set(total),
            available_copies: Set(available),
            shelf: Set(new.shelf),
            category: Set(new.category),
            description: Set(new.description),
            published_year: Set(new.published_year),
            publisher: Set(new.publisher),
            cover_image: Set(new.cover_image),
            created_at: Set(now()),
            updated_at: Set(now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(model.into())
    }

    async fn update_book(&self, id: i32, patch: BookPatch) -> Result<domain::Book, DomainError> {
        let model = Book::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;

        if let Some(isbn) = &patch.isbn {
            let duplicate = Book::find()
                .filter(book::Column::Isbn.eq(isbn.trim()))
                .filter(book::Column::Id.ne(id))
                .one(&self.db)
                .await?;
            if duplicate.is_some() {
                return Err(DomainError::Conflict(
                    "A book with this ISBN already exists".to_string(),
                ));
            }
        }

        let total = patch.total_copies.unwrap_or(model.total_copies);
        let available = patch.available_copies.unwrap_or(model.available_copies);
        domain::validate_copy_bounds(total, available)?;

        let mut active: book::ActiveModel = model.into();
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(author) = patch.author {
            active.author = Set(author);
        }
        if let Some(isbn) = patch.isbn {
            active.isbn = Set(isbn.trim().to_owned());
        }
        active.total_copies = Set(total);
        active.available_copies = Set(available);
        if let Some(shelf) = patch.shelf {
            active.shelf = Set(Some(shelf));
        }
        if let Some(category) = patch.category {
            active.category = Set(Some(category));
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(published_year) = patch.published_year {
            active.published_year = Set(Some(published_year));
        }
        if let Some(publisher) = patch.publisher {
            active.publisher = Set(Some(publisher));
        }
        if let Some(cover_image) = patch.cover_image {
            active.cover_image = Set(Some(cover_image));
        }
        active.updated_at = Set(now());

        let updated = active.update(&self.db).await?;
        Ok(updated.into())
    }

    async fn delete_book(&self, id: i32) -> Result<(), DomainError> {
        let model = Book::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;

        let active_borrows = Circulation::find()
            .filter(circulation::Column::BookId.eq(id))
            .filter(circulation::Column::Action.eq("borrow"))
            .filter(circulation::Column::Returned.eq(false))
            .count(&self.db)
            .await?;
        if active_borrows > 0 {
            return Err(DomainError::Conflict(
                "Cannot delete a book that is currently borrowed".to_string(),
            ));
        }

        model.delete(&self.db).await?;
        Ok(())
    }

    // ---- Identity ----

    async fn list_users(&self) -> Result<Vec<domain::User>, DomainError> {
        let users = User::find()
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await?;
        Ok(users.into_iter().map(domain::User::from).collect())
    }

    async fn get_user(&self, id: i32) -> Result<domain::User, DomainError> {
        let model = User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))?;
        Ok(model.into())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<domain::User>, DomainError> {
        let model = User::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?;
        Ok(model.map(domain::User::from))
    }

    async fn create_user(&self, new: NewUser) -> Result<domain::User, DomainError> {
        domain::validate_role(&new.role)?;

        let duplicate = User::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(&new.username))
                    .add(user::Column::Email.eq(&new.email)),
            )
            .one(&self.db)
            .await?;
        if duplicate.is_some() {
            return Err(DomainError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        let model = user::ActiveModel {
            username: Set(new.username),
            email: Set(new.email),
            password_hash: Set(new.password_hash),
            role: Set(new.role),
            created_at: Set(now()),
            updated_at: Set(now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(model.into())
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<domain::User, DomainError> {
        let model = User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))?;

        if let Some(role) = &patch.role {
            domain::validate_role(role)?;
        }

        if patch.username.is_some() || patch.email.is_some() {
            let duplicate = User::find()
                .filter(
                    Condition::any()
                        .add(
                            user::Column::Username
                                .eq(patch.username.as_deref().unwrap_or_default()),
                        )
                        .add(user::Column::Email.eq(patch.email.as_deref().unwrap_or_default())),
                )
                .filter(user::Column::Id.ne(id))
                .one(&self.db)
                .await?;
            if duplicate.is_some() {
                return Err(DomainError::Conflict(
                    "Username or email already exists".to_string(),
                ));
            }
        }

        let mut active: user::ActiveModel = model.into();
        if let Some(username) = patch.username {
            active.username = Set(username);
        }
        if let Some(email) = patch.email {
            active.email = Set(email);
        }
        if let Some(role) = patch.role {
            active.role = Set(role);
        }
        if let Some(password_hash) = patch.password_hash {
            active.password_hash = Set(password_hash);
        }
        active.updated_at = Set(now());

        let updated = active.update(&self.db).await?;
        Ok(updated.into())
    }

    async fn delete_user(&self, id: i32) -> Result<(), DomainError> {
        let model = User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))?;

        if model.role == "admin" {
            let admin_count = User::find()
                .filter(user::Column::Role.eq("admin"))
                .count(&self.db)
                .await?;
            if admin_count <= 1 {
                return Err(DomainError::Conflict(
                    "Cannot delete the last admin user".to_string(),
                ));
            }
        }

        model.delete(&self.db).await?;
        Ok(())
    }

    // ---- Circulation lifecycle ----

    async fn reserve(
        &self,
        user_id: i32,
        book_id: i32,
        due_date: String,
    ) -> Result<TransitionOutcome, DomainError> {
        let txn = self.db.begin().await?;

        let book = Book::find_by_id(book_id)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;

        if book.available_copies <= 0 {
            return Err(DomainError::Conflict(
                "No available copies of this book".to_string(),
            ));
        }

        let existing = Circulation::find()
            .filter(active_record_condition(user_id, book_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(DomainError::Conflict(
                "You already have this book reserved or borrowed".to_string(),
            ));
        }

        let user = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))?;

        // Soft reservation: no copy decrement until approval
        let record = circulation::ActiveModel {
            user_id: Set(user_id),
            book_id: Set(book_id),
            action: Set("reserve".to_owned()),
            action_date: Set(now()),
            due_date: Set(Some(due_date)),
            returned: Set(false),
            fine_amount: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut notifications = Vec::new();
        let (title, message) = domain::reserve_user_notice(&book.title);
        notifications.push(insert_notification(&txn, Some(user_id), &title, &message).await?);

        let admins = User::find()
            .filter(user::Column::Role.eq("admin"))
            .all(&txn)
            .await?;
        for admin in admins {
            let (title, message) = domain::reserve_admin_notice(&user.username, &book.title);
            notifications.push(insert_notification(&txn, Some(admin.id), &title, &message).await?);
        }

        txn.commit().await?;

        Ok(TransitionOutcome {
            record: record.into(),
            notifications,
        })
    }

    async fn approve(&self, circulation_id: i32) -> Result<TransitionOutcome, DomainError> {
        let txn = self.db.begin().await?;

        let record = Circulation::find_by_id(circulation_id)
            .one(&txn)
            .await?
            .filter(|r| r.action == "reserve" && !r.returned)
            .ok_or_else(|| DomainError::NotFound("Reservation not found".to_string()))?;

        let book = Book::find_by_id(record.book_id)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;

        // Re-checked here: reservations are soft, copies may have run out since
        if book.available_copies <= 0 {
            return Err(DomainError::Conflict(
                "No available copies of this book anymore".to_string(),
            ));
        }

        let user_id = record.user_id;
        let due_date = record.due_date.clone();

        let mut record_active: circulation::ActiveModel = record.into();
        record_active.action = Set("borrow".to_owned());
        let updated = record_active.update(&txn).await?;

        let title = book.title.clone();
        let remaining = book.available_copies - 1;
        let mut book_active: book::ActiveModel = book.into();
        book_active.available_copies = Set(remaining);
        book_active.updated_at = Set(now());
        book_active.update(&txn).await?;

        let (note_title, message) =
            domain::approve_notice(&title, due_date.as_deref().unwrap_or("not set"));
        let note = insert_notification(&txn, Some(user_id), &note_title, &message).await?;

        txn.commit().await?;

        Ok(TransitionOutcome {
            record: updated.into(),
            notifications: vec![note],
        })
    }

    async fn cancel(
        &self,
        circulation_id: i32,
        actor: &Actor,
    ) -> Result<TransitionOutcome, DomainError> {
        let txn = self.db.begin().await?;

        let record = Circulation::find_by_id(circulation_id)
            .one(&txn)
            .await?
            .filter(|r| r.action == "reserve" && !r.returned)
            .ok_or_else(|| DomainError::NotFound("Reservation not found".to_string()))?;

        if record.user_id != actor.id && !actor.is_admin() {
            return Err(DomainError::Forbidden(
                "You are not authorized to cancel this reservation".to_string(),
            ));
        }

        let book = Book::find_by_id(record.book_id)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;

        let snapshot: domain::CirculationRecord = record.clone().into();
        let owner_id = record.user_id;
        record.delete(&txn).await?;

        // Only tell the owner when an admin cancels on their behalf
        let mut notifications = Vec::new();
        if actor.is_admin() && owner_id != actor.id {
            let (title, message) = domain::cancel_notice(&book.title);
            notifications.push(insert_notification(&txn, Some(owner_id), &title, &message).await?);
        }

        txn.commit().await?;

        Ok(TransitionOutcome {
            record: snapshot,
            notifications,
        })
    }

    async fn return_book(
        &self,
        user_id: i32,
        book_id: i32,
    ) -> Result<TransitionOutcome, DomainError> {
        let txn = self.db.begin().await?;

        let book = Book::find_by_id(book_id)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::NotFound("Book not found".to_string()))?;

        let borrow = Circulation::find()
            .filter(circulation::Column::UserId.eq(user_id))
            .filter(circulation::Column::BookId.eq(book_id))
            .filter(circulation::Column::Action.eq("borrow"))
            .filter(circulation::Column::Returned.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                DomainError::Conflict("You have not borrowed this book".to_string())
            })?;

        let user = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))?;

        let mut borrow_active: circulation::ActiveModel = borrow.into();
        borrow_active.returned = Set(true);
        borrow_active.update(&txn).await?;

        let return_record = circulation::ActiveModel {
            user_id: Set(user_id),
            book_id: Set(book_id),
            action: Set("return".to_owned()),
            action_date: Set(now()),
            due_date: Set(None),
            returned: Set(false),
            fine_amount: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let title = book.title.clone();
        let restored = book.available_copies + 1;
        let mut book_active: book::ActiveModel = book.into();
        book_active.available_copies = Set(restored);
        book_active.updated_at = Set(now());
        book_active.update(&txn).await?;

        let mut notifications = Vec::new();
        let admins = User::find()
            .filter(user::Column::Role.eq("admin"))
            .all(&txn)
            .await?;
        for admin in admins {
            let (note_title, message) = domain::return_admin_notice(&user.username, &title);
            notifications
                .push(insert_notification(&txn, Some(admin.id), &note_title, &message).await?);
        }

        txn.commit().await?;

        Ok(TransitionOutcome {
            record: return_record.into(),
            notifications,
        })
    }

    async fn list_circulation(&self) -> Result<Vec<CirculationWithDetails>, DomainError> {
        let records = Circulation::find()
            .order_by_desc(circulation::Column::ActionDate)
            .order_by_desc(circulation::Column::Id)
            .find_also_related(Book)
            .all(&self.db)
            .await?;

        let user_ids: Vec<i32> = records.iter().map(|(r, _)| r.user_id).collect();
        let mut usernames: HashMap<i32, String> = HashMap::new();
        if !user_ids.is_empty() {
            let users = User::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(&self.db)
                .await?;
            for u in users {
                usernames.insert(u.id, u.username);
            }
        }

        Ok(records
            .into_iter()
            .map(|(record, book)| {
                let username = usernames.get(&record.user_id).cloned();
                CirculationWithDetails {
                    title: book
                        .as_ref()
                        .map(|b| b.title.clone())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    author: book
                        .map(|b| b.author)
                        .unwrap_or_else(|| "Unknown".to_string()),
                    username,
                    record: record.into(),
                }
            })
            .collect())
    }

    async fn list_circulation_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<CirculationWithDetails>, DomainError> {
        let records = Circulation::find()
            .filter(circulation::Column::UserId.eq(user_id))
            .order_by_desc(circulation::Column::ActionDate)
            .order_by_desc(circulation::Column::Id)
            .find_also_related(Book)
            .all(&self.db)
            .await?;

        Ok(records
            .into_iter()
            .map(|(record, book)| CirculationWithDetails {
                title: book
                    .as_ref()
                    .map(|b| b.title.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                author: book
                    .map(|b| b.author)
                    .unwrap_or_else(|| "Unknown".to_string()),
                username: None,
                record: record.into(),
            })
            .collect())
    }

    async fn list_borrowed(&self, user_id: i32) -> Result<Vec<BorrowedBook>, DomainError> {
        let records = Circulation::find()
            .filter(circulation::Column::UserId.eq(user_id))
            .filter(circulation::Column::Action.eq("borrow"))
            .filter(circulation::Column::Returned.eq(false))
            .order_by_desc(circulation::Column::ActionDate)
            .order_by_desc(circulation::Column::Id)
            .find_also_related(Book)
            .all(&self.db)
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|(record, book)| {
                book.map(|book| BorrowedBook {
                    id: record.id,
                    action_date: record.action_date,
                    due_date: record.due_date,
                    fine_amount: record.fine_amount,
                    book_id: book.id,
                    title: book.title,
                    author: book.author,
                    isbn: book.isbn,
                    cover_image: book.cover_image,
                })
            })
            .collect())
    }

    // ---- Notifications ----

    async fn append_notification(
        &self,
        user_id: Option<i32>,
        title: &str,
        message: &str,
    ) -> Result<domain::Notification, DomainError> {
        insert_notification(&self.db, user_id, title, message).await
    }

    async fn notifications_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<domain::Notification>, DomainError> {
        let rows = Notification::find()
            .filter(
                Condition::any()
                    .add(notification::Column::UserId.eq(user_id))
                    .add(notification::Column::UserId.is_null()),
            )
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(domain::Notification::from).collect())
    }

    // ---- Dashboard ----

    async fn dashboard_stats(&self) -> Result<DashboardStats, DomainError> {
        let books = Book::find().all(&self.db).await?;
        let total_books = books.len() as i64;
        let available_books: i64 = books.iter().map(|b| b.available_copies as i64).sum();

        let borrowed_books = Circulation::find()
            .filter(circulation::Column::Action.eq("borrow"))
            .filter(circulation::Column::Returned.eq(false))
            .count(&self.db)
            .await? as i64;

        let notifications = Notification::find()
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .limit(5)
            .all(&self.db)
            .await?
            .into_iter()
            .map(domain::Notification::from)
            .collect();

        Ok(DashboardStats {
            total_books,
            available_books,
            borrowed_books,
            notifications,
        })
    }
}
