use crate::auth::hash_password;
use crate::domain::{DomainError, LibraryStore, NewBook, NewUser};

/// Insert demo users and books. Safe to run more than once: duplicates are
/// skipped, anything else propagates.
pub async fn seed_demo_data(store: &dyn LibraryStore) -> Result<(), DomainError> {
    let admin_password = hash_password("password").map_err(DomainError::Infrastructure)?;
    let user_password = hash_password("password").map_err(DomainError::Infrastructure)?;

    let users = vec![
        NewUser {
            username: "admin".to_owned(),
            email: "admin@example.com".to_owned(),
            password_hash: admin_password,
            role: "admin".to_owned(),
        },
        NewUser {
            username: "user1".to_owned(),
            email: "user1@example.com".to_owned(),
            password_hash: user_password,
            role: "patron".to_owned(),
        },
    ];

    for user in users {
        match store.create_user(user).await {
            Ok(_) | Err(DomainError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let books = vec![
        NewBook {
            title: "The Great Gatsby".to_owned(),
            author: "F. Scott Fitzgerald".to_owned(),
            isbn: "9780743273565".to_owned(),
            total_copies: Some(5),
            shelf: Some("A1".to_owned()),
            category: Some("Fiction".to_owned()),
            published_year: Some(1925),
            publisher: Some("Charles Scribner's Sons".to_owned()),
            ..Default::default()
        },
        NewBook {
            title: "To Kill a Mockingbird".to_owned(),
            author: "Harper Lee".to_owned(),
            isbn: "9780061120084".to_owned(),
            total_copies: Some(3),
            shelf: Some("B2".to_owned()),
            category: Some("Classic".to_owned()),
            published_year: Some(1960),
            publisher: Some("J. B. Lippincott & Co.".to_owned()),
            ..Default::default()
        },
    ];

    for book in books {
        match store.create_book(book).await {
            Ok(_) | Err(DomainError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
