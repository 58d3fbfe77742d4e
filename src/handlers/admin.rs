use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::BookingFilter;
use crate::errors::AppError;
use crate::handlers::{check_auth, parse_date, parse_slot};
use crate::models::{
    Booking, BookingEventKind, BookingStatus, FieldError, GuestContact, PricingConfig,
    PricingTable, UnavailableSlot,
};
use crate::services::events::record_booking_event;
use crate::services::ledger::{self, DashboardStats, MaintenanceOutcome, ManualBooking};
use crate::services::{pricing, sweeper};
use crate::state::AppState;

/// Booking as the admin panel sees it: the stored row plus derived money
/// and status fields.
#[derive(Serialize)]
pub struct AdminBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub effective_status: BookingStatus,
    pub amount_paid: i64,
    pub balance_due: i64,
}

impl AdminBooking {
    fn of(booking: Booking, state: &AppState) -> Self {
        Self {
            effective_status: booking.effective_status(state.clock.now()),
            amount_paid: booking.amount_paid(),
            balance_due: booking.balance_due(),
            booking,
        }
    }
}

fn parse_status(field: &'static str, raw: &str) -> Result<BookingStatus, FieldError> {
    BookingStatus::parse(raw.trim()).ok_or(FieldError::new(field, "unknown booking status"))
}

// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    Ok(Json(ledger::dashboard_stats(&db, state.clock.now())?))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<AdminBooking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut errors = vec![];
    let mut filter = BookingFilter {
        include_deleted: query.include_deleted,
        ..BookingFilter::default()
    };
    if let Some(limit) = query.limit {
        filter.limit = limit;
    }
    match query.status.as_deref().map(|raw| parse_status("status", raw)) {
        Some(Ok(status)) => filter.status = Some(status),
        Some(Err(e)) => errors.push(e),
        None => {}
    }
    match query.from.as_deref().map(|raw| parse_date("from", raw)) {
        Some(Ok(date)) => filter.from = Some(date),
        Some(Err(e)) => errors.push(e),
        None => {}
    }
    match query.to.as_deref().map(|raw| parse_date("to", raw)) {
        Some(Ok(date)) => filter.to = Some(date),
        Some(Err(e)) => errors.push(e),
        None => {}
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let bookings = {
        let db = state.db()?;
        ledger::list_bookings(&db, &filter)?
    };
    Ok(Json(
        bookings
            .into_iter()
            .map(|b| AdminBooking::of(b, &state))
            .collect(),
    ))
}

// POST /api/admin/bookings
#[derive(Deserialize)]
pub struct ManualBookingRequest {
    #[serde(default)]
    pub guest_name: String,
    #[serde(default)]
    pub guest_email: String,
    #[serde(default)]
    pub guest_whatsapp: String,
    #[serde(default)]
    pub booking_date: String,
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub is_couple_promo: bool,
    /// Quoted from the active table when omitted.
    pub total_price: Option<i64>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

pub async fn create_manual_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ManualBookingRequest>,
) -> Result<(StatusCode, Json<AdminBooking>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let contact = GuestContact {
        name: body.guest_name,
        email: body.guest_email,
        whatsapp: body.guest_whatsapp,
    };
    let date = parse_date("booking_date", &body.booking_date);
    let slot = parse_slot("slot", &body.slot);
    let status = match body.status.as_deref() {
        Some(raw) => parse_status("status", raw),
        None => Ok(BookingStatus::Confirmed),
    };
    let (booking_date, slot, status) = match (date, slot, status) {
        (Ok(date), Ok(slot), Ok(status)) => (date, slot, status),
        (date, slot, status) => {
            let mut errors = contact.validate_manual();
            errors.extend([date.err(), slot.err(), status.err()].into_iter().flatten());
            return Err(AppError::Validation(errors));
        }
    };

    let booking = {
        let mut db = state.db()?;
        let total_price = match body.total_price {
            Some(price) => price,
            None => pricing::quote(&db, booking_date, slot, body.is_couple_promo)?,
        };
        let req = ManualBooking {
            contact,
            booking_date,
            slot,
            is_couple_promo: body.is_couple_promo,
            total_price,
            status,
            admin_notes: body.admin_notes,
        };
        ledger::create_manual_booking(&mut db, &req, state.config.hold_duration(), state.clock.now())?
    };

    record_booking_event(
        &state,
        BookingEventKind::Created,
        Some(booking.id.as_str()),
        &format!("manual {} {} {}", booking.booking_date, booking.slot, booking.status),
    );
    Ok((StatusCode::CREATED, Json(AdminBooking::of(booking, &state))))
}

// GET /api/admin/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AdminBooking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db()?;
        ledger::get_booking(&db, &id, true)?
    };
    Ok(Json(AdminBooking::of(booking, &state)))
}

// DELETE /api/admin/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    {
        let db = state.db()?;
        ledger::soft_delete(&db, &id, state.clock.now())?;
    }

    record_booking_event(&state, BookingEventKind::Deleted, Some(id.as_str()), "");
    Ok(Json(serde_json::json!({"ok": true})))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<AdminBooking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = parse_status("status", &body.status).map_err(|e| AppError::Validation(vec![e]))?;
    let booking = {
        let mut db = state.db()?;
        ledger::set_status(&mut db, &id, status, state.clock.now())?
    };

    record_booking_event(
        &state,
        BookingEventKind::StatusChanged,
        Some(booking.id.as_str()),
        booking.status.as_str(),
    );
    Ok(Json(AdminBooking::of(booking, &state)))
}

// POST /api/admin/bookings/:id/reassign
#[derive(Deserialize)]
pub struct ReassignRequest {
    #[serde(default)]
    pub booking_date: String,
    #[serde(default)]
    pub slot: String,
}

pub async fn reassign(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReassignRequest>,
) -> Result<Json<AdminBooking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let (date, slot) = match (
        parse_date("booking_date", &body.booking_date),
        parse_slot("slot", &body.slot),
    ) {
        (Ok(date), Ok(slot)) => (date, slot),
        (date, slot) => {
            let errors = [date.err(), slot.err()].into_iter().flatten().collect();
            return Err(AppError::Validation(errors));
        }
    };

    let booking = {
        let mut db = state.db()?;
        ledger::reassign(&mut db, &id, date, slot, state.clock.now())?
    };

    record_booking_event(
        &state,
        BookingEventKind::Reassigned,
        Some(booking.id.as_str()),
        &format!("{} {}", booking.booking_date, booking.slot),
    );
    Ok(Json(AdminBooking::of(booking, &state)))
}

// POST /api/admin/bookings/:id/notes
#[derive(Deserialize)]
pub struct NotesRequest {
    pub admin_notes: Option<String>,
}

pub async fn update_notes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<NotesRequest>,
) -> Result<Json<AdminBooking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db()?;
        ledger::update_notes(&db, &id, body.admin_notes.as_deref(), state.clock.now())?
    };

    record_booking_event(&state, BookingEventKind::NotesUpdated, Some(booking.id.as_str()), "");
    Ok(Json(AdminBooking::of(booking, &state)))
}

// POST /api/admin/bookings/:id/restore
pub async fn restore(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AdminBooking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let mut db = state.db()?;
        ledger::restore(&mut db, &id, state.clock.now())?
    };

    record_booking_event(
        &state,
        BookingEventKind::Restored,
        Some(booking.id.as_str()),
        booking.status.as_str(),
    );
    Ok(Json(AdminBooking::of(booking, &state)))
}

// DELETE /api/admin/bookings/:id/purge
pub async fn purge(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    {
        let db = state.db()?;
        ledger::purge(&db, &id)?;
    }

    record_booking_event(&state, BookingEventKind::Purged, Some(id.as_str()), "");
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/admin/unavailable
pub async fn unavailable(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UnavailableSlot>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    Ok(Json(ledger::list_unavailable_slots(&db, state.clock.now(), None)?))
}

// POST /api/admin/maintenance
#[derive(Deserialize)]
pub struct MaintenanceRequest {
    #[serde(default)]
    pub date: String,
}

pub async fn block_maintenance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<MaintenanceRequest>,
) -> Result<Json<MaintenanceOutcome>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = parse_date("date", &body.date).map_err(|e| AppError::Validation(vec![e]))?;
    let outcome = {
        let mut db = state.db()?;
        ledger::block_maintenance(&mut db, date, state.clock.now())?
    };

    if !outcome.blocked.is_empty() {
        let slots: Vec<_> = outcome.blocked.iter().map(|s| s.as_str()).collect();
        record_booking_event(
            &state,
            BookingEventKind::MaintenanceBlocked,
            None,
            &format!("{date} {}", slots.join(",")),
        );
    }
    Ok(Json(outcome))
}

// DELETE /api/admin/maintenance/:date
pub async fn unblock_maintenance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(date): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = parse_date("date", &date).map_err(|e| AppError::Validation(vec![e]))?;
    let removed = {
        let db = state.db()?;
        ledger::unblock_maintenance(&db, date, state.clock.now())?
    };

    if removed > 0 {
        record_booking_event(
            &state,
            BookingEventKind::MaintenanceUnblocked,
            None,
            &date.to_string(),
        );
    }
    Ok(Json(serde_json::json!({"removed": removed})))
}

// GET /api/admin/pricing
pub async fn get_pricing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PricingConfig>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    Ok(Json(pricing::load_pricing(&db)?))
}

// PUT /api/admin/pricing
pub async fn update_pricing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(table): Json<PricingTable>,
) -> Result<Json<PricingConfig>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    Ok(Json(pricing::save_pricing(&db, &table, state.clock.now())?))
}

// POST /api/admin/holds/expire
pub async fn expire_holds(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let expired = sweeper::sweep_once(&state)?;
    Ok(Json(serde_json::json!({"expired": expired})))
}
