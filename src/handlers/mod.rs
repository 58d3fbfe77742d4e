pub mod admin;
pub mod events;
pub mod health;
pub mod public;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::models::{FieldError, Slot};
use crate::state::AppState;

/// Full HTTP surface: public booking routes, bearer-protected admin routes
/// and the admin SSE feed.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/availability", get(public::availability))
        .route("/api/calendar", get(public::calendar))
        .route("/api/pricing", get(public::pricing))
        .route("/api/quote", get(public::quote))
        .route("/api/bookings", post(public::create_booking))
        .route("/api/bookings/:id", get(public::get_booking))
        .route("/api/admin/stats", get(admin::get_stats))
        .route(
            "/api/admin/bookings",
            get(admin::list_bookings).post(admin::create_manual_booking),
        )
        .route(
            "/api/admin/bookings/:id",
            get(admin::get_booking).delete(admin::delete_booking),
        )
        .route("/api/admin/bookings/:id/status", post(admin::set_status))
        .route("/api/admin/bookings/:id/reassign", post(admin::reassign))
        .route("/api/admin/bookings/:id/notes", post(admin::update_notes))
        .route("/api/admin/bookings/:id/restore", post(admin::restore))
        .route("/api/admin/bookings/:id/purge", delete(admin::purge))
        .route("/api/admin/unavailable", get(admin::unavailable))
        .route("/api/admin/maintenance", post(admin::block_maintenance))
        .route(
            "/api/admin/maintenance/:date",
            delete(admin::unblock_maintenance),
        )
        .route(
            "/api/admin/pricing",
            get(admin::get_pricing).put(admin::update_pricing),
        )
        .route("/api/admin/holds/expire", post(admin::expire_holds))
        .route("/api/admin/events", get(events::events_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub(crate) fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, FieldError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| FieldError::new(field, "expected a date as YYYY-MM-DD"))
}

pub(crate) fn parse_slot(field: &'static str, raw: &str) -> Result<Slot, FieldError> {
    Slot::parse(raw.trim()).ok_or(FieldError::new(field, "expected DAY or NIGHT"))
}
