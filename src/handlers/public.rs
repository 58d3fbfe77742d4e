use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::handlers::{parse_date, parse_slot};
use crate::models::booking::deposit_for;
use crate::models::{
    Booking, BookingEventKind, BookingStatus, CalendarDay, GuestContact, PricingConfig, Slot,
    UnavailableSlot,
};
use crate::services::events::record_booking_event;
use crate::services::ledger::{self, NewBooking};
use crate::services::pricing;
use crate::state::AppState;

// GET /api/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub from: Option<String>,
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<UnavailableSlot>>, AppError> {
    let today = state.clock.today();
    let from = match query.from.as_deref() {
        Some(raw) => parse_date("from", raw).map_err(|e| AppError::Validation(vec![e]))?,
        None => today,
    };

    let db = state.db()?;
    let slots = ledger::list_unavailable_slots(&db, state.clock.now(), Some(from.max(today)))?;
    Ok(Json(slots))
}

// GET /api/calendar?from=&to=
#[derive(Deserialize)]
pub struct CalendarQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<CalendarDay>>, AppError> {
    let today = state.clock.today();
    let mut errors = vec![];
    let from = match query.from.as_deref().map(|raw| parse_date("from", raw)) {
        Some(Ok(date)) => date,
        Some(Err(e)) => {
            errors.push(e);
            today
        }
        None => today,
    };
    let to = match query.to.as_deref().map(|raw| parse_date("to", raw)) {
        Some(Ok(date)) => date,
        Some(Err(e)) => {
            errors.push(e);
            from
        }
        None => from + chrono::Duration::days(30),
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let db = state.db()?;
    Ok(Json(ledger::calendar(&db, from, to, state.clock.now())?))
}

// GET /api/pricing
pub async fn pricing(State(state): State<Arc<AppState>>) -> Result<Json<PricingConfig>, AppError> {
    let db = state.db()?;
    Ok(Json(pricing::load_pricing(&db)?))
}

// GET /api/quote?date=&slot=&couple=
#[derive(Deserialize)]
pub struct QuoteQuery {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub couple: bool,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    pub date: NaiveDate,
    pub slot: Slot,
    pub is_couple_promo: bool,
    pub total_price: i64,
    pub deposit: i64,
}

pub async fn quote(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, AppError> {
    let date = parse_date("date", &query.date);
    let slot = parse_slot("slot", &query.slot);
    let (date, slot) = match (date, slot) {
        (Ok(date), Ok(slot)) => (date, slot),
        (date, slot) => {
            let errors = [date.err(), slot.err()].into_iter().flatten().collect();
            return Err(AppError::Validation(errors));
        }
    };

    let db = state.db()?;
    let total_price = pricing::quote(&db, date, slot, query.couple)?;
    Ok(Json(QuoteResponse {
        date,
        slot,
        is_couple_promo: query.couple,
        total_price,
        deposit: deposit_for(total_price),
    }))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
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
}

/// What a guest sees while paying: no contact details, effective status.
#[derive(Serialize)]
pub struct PublicBookingView {
    pub id: String,
    pub booking_date: NaiveDate,
    pub slot: Slot,
    pub status: BookingStatus,
    pub is_couple_promo: bool,
    pub total_price: i64,
    pub deposit: i64,
    pub expires_at: Option<NaiveDateTime>,
    pub seconds_remaining: Option<i64>,
}

impl PublicBookingView {
    fn of(booking: &Booking, now: NaiveDateTime) -> Self {
        let status = booking.effective_status(now);
        let expires_at = booking.expires_at.filter(|_| status == BookingStatus::PendingPayment);
        Self {
            id: booking.id.clone(),
            booking_date: booking.booking_date,
            slot: booking.slot,
            status,
            is_couple_promo: booking.is_couple_promo,
            total_price: booking.total_price,
            deposit: deposit_for(booking.total_price),
            expires_at,
            seconds_remaining: expires_at.map(|exp| (exp - now).num_seconds().max(0)),
        }
    }
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<PublicBookingView>), AppError> {
    let contact = GuestContact {
        name: body.guest_name,
        email: body.guest_email,
        whatsapp: body.guest_whatsapp,
    };
    let date = parse_date("booking_date", &body.booking_date);
    let slot = parse_slot("slot", &body.slot);
    let (booking_date, slot) = match (date, slot) {
        (Ok(date), Ok(slot)) => (date, slot),
        (date, slot) => {
            let mut errors = contact.validate();
            errors.extend([date.err(), slot.err()].into_iter().flatten());
            return Err(AppError::Validation(errors));
        }
    };

    let req = NewBooking {
        contact,
        booking_date,
        slot,
        is_couple_promo: body.is_couple_promo,
    };
    let now = state.clock.now();
    let booking = {
        let mut db = state.db()?;
        ledger::create_booking(&mut db, &req, state.config.hold_duration(), now)?
    };

    record_booking_event(
        &state,
        BookingEventKind::Created,
        Some(booking.id.as_str()),
        &format!("{} {} {}", booking.guest_name, booking.booking_date, booking.slot),
    );
    Ok((StatusCode::CREATED, Json(PublicBookingView::of(&booking, now))))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PublicBookingView>, AppError> {
    let db = state.db()?;
    let booking = ledger::get_booking(&db, &id, false)?;
    Ok(Json(PublicBookingView::of(&booking, state.clock.now())))
}
