//! Circulation orchestrator - Pure business logic without HTTP layer
//!
//! Validates the caller and the input, delegates the atomic transition to
//! the selected store, then hands the written notifications to the live
//! delivery channel. Delivery is best-effort and never rolls back a
//! committed transition.

use chrono::{Duration, Utc};

use crate::domain::{Actor, CirculationRecord, DomainError, TransitionOutcome};
use crate::infrastructure::AppState;

/// Default loan period when the caller supplies no due date
const DEFAULT_LOAN_DAYS: i64 = 14;

fn resolve_due_date(due_date: Option<String>) -> Result<String, DomainError> {
    match due_date {
        Some(raw) => {
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&raw) {
                return Ok(parsed.to_rfc3339());
            }
            // Date-only input is taken as midnight UTC
            let date = chrono::NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| DomainError::InvalidInput("Invalid due date format".to_string()))?;
            Ok(date.and_time(chrono::NaiveTime::MIN).and_utc().to_rfc3339())
        }
        None => Ok((Utc::now() + Duration::days(DEFAULT_LOAN_DAYS)).to_rfc3339()),
    }
}

fn dispatch(state: &AppState, outcome: TransitionOutcome) -> CirculationRecord {
    if !outcome.notifications.is_empty() {
        let delivery = state.delivery.clone();
        let notifications = outcome.notifications;
        tokio::spawn(async move {
            for note in &notifications {
                delivery.push(note).await;
            }
        });
    }
    outcome.record
}

/// Reserve a book (soft reservation: no stock hold until approval).
/// The legacy borrow endpoint goes through here as well; direct borrowing
/// without admin approval is disallowed.
pub async fn reserve(
    state: &AppState,
    actor: &Actor,
    book_id: i32,
    due_date: Option<String>,
) -> Result<CirculationRecord, DomainError> {
    let due_date = resolve_due_date(due_date)?;
    tracing::info!(user_id = actor.id, book_id, "reserve requested");

    let outcome = state.store.reserve(actor.id, book_id, due_date).await?;
    Ok(dispatch(state, outcome))
}

/// Approve a pending reservation, converting it into a borrow. Admin only.
pub async fn approve(
    state: &AppState,
    actor: &Actor,
    circulation_id: i32,
) -> Result<CirculationRecord, DomainError> {
    actor.require_admin()?;
    tracing::info!(admin_id = actor.id, circulation_id, "approval requested");

    let outcome = state.store.approve(circulation_id).await?;
    Ok(dispatch(state, outcome))
}

/// Cancel a pending reservation. Owner or admin; the ownership check runs
/// inside the store's critical section against the actual record.
pub async fn cancel(
    state: &AppState,
    actor: &Actor,
    circulation_id: i32,
) -> Result<CirculationRecord, DomainError> {
    tracing::info!(user_id = actor.id, circulation_id, "cancel requested");

    let outcome = state.store.cancel(circulation_id, actor).await?;
    Ok(dispatch(state, outcome))
}

/// Return a borrowed book.
pub async fn return_book(
    state: &AppState,
    actor: &Actor,
    book_id: i32,
) -> Result<CirculationRecord, DomainError> {
    tracing::info!(user_id = actor.id, book_id, "return requested");

    let outcome = state.store.return_book(actor.id, book_id).await?;
    Ok(dispatch(state, outcome))
}
