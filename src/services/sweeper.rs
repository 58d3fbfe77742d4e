use std::sync::Arc;
use std::time::Duration;

use crate::errors::AppError;
use crate::models::BookingEventKind;
use crate::services::events::record_booking_event;
use crate::services::ledger;
use crate::state::AppState;

/// Background task that periodically writes lapsed holds back as EXPIRED.
/// Occupancy never depends on it; it only keeps stored statuses tidy.
pub async fn run_sweeper(state: Arc<AppState>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = sweep_once(&state) {
            tracing::warn!(error = %e, "hold sweep failed");
        }
    }
}

pub fn sweep_once(state: &Arc<AppState>) -> Result<usize, AppError> {
    let count = {
        let db = state.db()?;
        ledger::expire_stale_holds(&db, state.clock.now())?
    };
    if count > 0 {
        record_booking_event(state, BookingEventKind::HoldsExpired, None, &count.to_string());
    }
    Ok(count)
}
