use std::sync::atomic::Ordering;
use std::sync::Arc;

use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingEvent, BookingEventKind};
use crate::state::AppState;

/// Appends to the booking event log and fans out every event not yet sent,
/// this one included. Failures are logged, never returned: the mutation that
/// produced the event has already committed.
pub fn record_booking_event(
    state: &Arc<AppState>,
    kind: BookingEventKind,
    booking_id: Option<&str>,
    detail: &str,
) {
    let now = state.clock.now();
    let pending = state.db().and_then(|db| {
        queries::insert_booking_event(&db, booking_id, kind.as_str(), detail, &now)?;
        take_unpublished(state, &db)
    });

    match pending {
        Ok(events) => broadcast(state, events),
        Err(e) => {
            tracing::error!(error = %e, kind = kind.as_str(), "failed to record booking event");
        }
    }
}

/// Caller holds the db lock, so two publishers never claim the same ids.
fn take_unpublished(state: &AppState, db: &Connection) -> Result<Vec<BookingEvent>, AppError> {
    let after = state.events_published.load(Ordering::SeqCst);
    let events = queries::get_booking_events_since(db, after, i64::MAX)?;
    if let Some(last) = events.last() {
        state.events_published.store(last.id, Ordering::SeqCst);
    }
    Ok(events)
}

fn broadcast(state: &AppState, events: Vec<BookingEvent>) {
    for event in events {
        // No receivers is fine
        let _ = state.events_tx.send(event);
    }
}
