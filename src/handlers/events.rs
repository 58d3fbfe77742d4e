use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::BookingEvent;
use crate::state::AppState;

const CATCHUP_LIMIT: i64 = 500;

#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub last_id: Option<i64>,
}

fn to_sse(event: &BookingEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default()
        .id(event.id.to_string())
        .event("booking_event")
        .data(data)
}

// GET /api/admin/events — SSE stream
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the token rides in the query string
    let token = query.token.as_deref().unwrap_or("");
    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    // Subscribe before reading the backlog so nothing falls in between
    let rx = state.events_tx.subscribe();
    let last_id = query.last_id.unwrap_or(0);
    let catchup = {
        let db = state.db()?;
        queries::get_booking_events_since(&db, last_id, CATCHUP_LIMIT)?
    };
    let newest_sent = catchup.last().map_or(last_id, |e| e.id);

    let catchup_stream = tokio_stream::iter(catchup.into_iter().map(|event| Ok::<_, Infallible>(to_sse(&event))));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.id > newest_sent => Some(Ok(to_sse(&event))),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged, events dropped");
            None
        }
    });

    let keepalive_stream = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().comment("keepalive")));

    let merged = catchup_stream.chain(live_stream).merge(keepalive_stream);
    Ok(Sse::new(merged))
}
