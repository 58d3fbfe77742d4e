use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::whole_seconds;
use crate::db::queries::{self, BookingFilter};
use crate::errors::AppError;
use crate::models::availability::summarize;
use crate::models::{
    Booking, BookingEventKind, BookingStatus, CalendarDay, FieldError, GuestContact, Slot,
    UnavailableSlot,
};
use crate::services::pricing;

/// Longest range the calendar summary will cover.
pub const MAX_CALENDAR_DAYS: i64 = 366;
pub const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub contact: GuestContact,
    pub booking_date: NaiveDate,
    pub slot: Slot,
    pub is_couple_promo: bool,
}

#[derive(Debug, Clone)]
pub struct ManualBooking {
    pub contact: GuestContact,
    pub booking_date: NaiveDate,
    pub slot: Slot,
    pub is_couple_promo: bool,
    pub total_price: i64,
    pub status: BookingStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MaintenanceOutcome {
    pub date: NaiveDate,
    pub blocked: Vec<Slot>,
    pub already_blocked: Vec<Slot>,
    /// Slots left alone because a guest booking holds them.
    pub occupied: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub by_status: BTreeMap<String, i64>,
    pub active_holds: usize,
    pub lapsed_holds: usize,
    pub upcoming_occupied: usize,
    pub collected: i64,
    pub outstanding: i64,
}

// ── Availability ──

/// The booking currently holding (date, slot), if any.
fn occupant(
    conn: &Connection,
    date: NaiveDate,
    slot: Slot,
    now: NaiveDateTime,
    exclude_id: Option<&str>,
) -> Result<Option<Booking>, AppError> {
    let rows = queries::get_potential_occupants(conn, Some((date, slot)), None)?;
    Ok(rows
        .into_iter()
        .find(|b| exclude_id != Some(b.id.as_str()) && b.occupies(now)))
}

/// Writes lapsed holds on one slot back as EXPIRED and logs a `holds_expired`
/// event in the same transaction.
fn expire_slot_holds(
    conn: &Connection,
    date: NaiveDate,
    slot: Slot,
    now: NaiveDateTime,
) -> Result<usize, AppError> {
    let count = queries::expire_holds(conn, &now, Some((date, slot)))?;
    if count > 0 {
        let detail = format!("{count} on {date} {slot}");
        queries::insert_booking_event(conn, None, BookingEventKind::HoldsExpired.as_str(), &detail, &now)?;
        tracing::info!(count, date = %date, slot = %slot, "expired lapsed holds on slot");
    }
    Ok(count)
}

/// Must run inside a write transaction. Lapsed holds on the slot are written
/// back as EXPIRED first so they release their place in the unique index.
fn ensure_free(
    conn: &Connection,
    date: NaiveDate,
    slot: Slot,
    now: NaiveDateTime,
    exclude_id: Option<&str>,
) -> Result<(), AppError> {
    expire_slot_holds(conn, date, slot, now)?;
    if let Some(other) = occupant(conn, date, slot, now, exclude_id)? {
        tracing::debug!(date = %date, slot = %slot, holder = %other.id, "slot occupied");
        return Err(AppError::SlotConflict { date, slot });
    }
    Ok(())
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// A write that trips the active-slot index lost a race for the slot.
fn slot_write<T>(result: anyhow::Result<T>, date: NaiveDate, slot: Slot) -> Result<T, AppError> {
    result.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::SlotConflict { date, slot }
        } else {
            AppError::Persistence(e)
        }
    })
}

/// Occupied slots, optionally from a date onward.
pub fn list_unavailable_slots(
    conn: &Connection,
    now: NaiveDateTime,
    from: Option<NaiveDate>,
) -> Result<Vec<UnavailableSlot>, AppError> {
    let rows = queries::get_potential_occupants(conn, None, from)?;
    let mut slots: Vec<UnavailableSlot> = rows
        .iter()
        .filter(|b| b.occupies(now))
        .map(|b| UnavailableSlot {
            date: b.booking_date,
            slot: b.slot,
        })
        .collect();
    slots.sort();
    Ok(slots)
}

pub fn calendar(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    now: NaiveDateTime,
) -> Result<Vec<CalendarDay>, AppError> {
    if to < from {
        return Err(AppError::field("to", "end date is before start date"));
    }
    if (to - from).num_days() >= MAX_CALENDAR_DAYS {
        return Err(AppError::field("to", "range is longer than a year"));
    }
    let occupied = list_unavailable_slots(conn, now, Some(from))?;
    Ok(summarize(&occupied, from, to))
}

// ── Creation ──

pub fn create_booking(
    conn: &mut Connection,
    req: &NewBooking,
    hold: Duration,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let now = whole_seconds(now);
    let mut errors = req.contact.validate();
    if req.booking_date < now.date() {
        errors.push(FieldError::new("booking_date", "date is in the past"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    ensure_free(&tx, req.booking_date, req.slot, now, None)?;

    let pricing = pricing::load_pricing(&tx)?;
    let contact = req.contact.normalized();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        guest_name: contact.name,
        guest_email: contact.email,
        guest_whatsapp: contact.whatsapp,
        booking_date: req.booking_date,
        slot: req.slot,
        is_couple_promo: req.is_couple_promo,
        total_price: pricing
            .table
            .price(req.booking_date, req.slot, req.is_couple_promo),
        status: BookingStatus::PendingPayment,
        expires_at: Some(now + hold),
        admin_notes: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };
    slot_write(queries::insert_booking(&tx, &booking), booking.booking_date, booking.slot)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        date = %booking.booking_date,
        slot = %booking.slot,
        price = booking.total_price,
        pricing_version = pricing.version,
        "booking hold created"
    );
    Ok(booking)
}

pub fn create_manual_booking(
    conn: &mut Connection,
    req: &ManualBooking,
    hold: Duration,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let now = whole_seconds(now);
    let mut errors = req.contact.validate_manual();
    if req.total_price < 0 {
        errors.push(FieldError::new("total_price", "price must be non-negative"));
    }
    if !req.status.is_manual_initial() {
        errors.push(FieldError::new("status", "status cannot be used for a new booking"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if req.status.may_occupy() {
        ensure_free(&tx, req.booking_date, req.slot, now, None)?;
    }

    let contact = req.contact.normalized();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        guest_name: contact.name,
        guest_email: contact.email,
        guest_whatsapp: contact.whatsapp,
        booking_date: req.booking_date,
        slot: req.slot,
        is_couple_promo: req.is_couple_promo,
        total_price: req.total_price,
        status: req.status,
        expires_at: (req.status == BookingStatus::PendingPayment).then(|| now + hold),
        admin_notes: clean_notes(req.admin_notes.as_deref()),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };
    slot_write(queries::insert_booking(&tx, &booking), booking.booking_date, booking.slot)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        date = %booking.booking_date,
        slot = %booking.slot,
        status = %booking.status,
        "manual booking created"
    );
    Ok(booking)
}

// ── Lookup ──

pub fn get_booking(conn: &Connection, id: &str, include_deleted: bool) -> Result<Booking, AppError> {
    match queries::get_booking_by_id(conn, id)? {
        Some(b) if include_deleted || b.deleted_at.is_none() => Ok(b),
        _ => Err(AppError::booking_not_found(id)),
    }
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
    let mut filter = filter.clone();
    filter.limit = filter.limit.clamp(1, MAX_LIST_LIMIT);
    Ok(queries::list_bookings(conn, &filter)?)
}

// ── Status ──

pub fn set_status(
    conn: &mut Connection,
    id: &str,
    status: BookingStatus,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let now = whole_seconds(now);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut booking = get_booking(&tx, id, false)?;
    if booking.status == status {
        return Ok(booking);
    }

    let current = booking.effective_status(now);
    if !current.can_transition_to(status) {
        return Err(AppError::InvalidTransition {
            from: current,
            to: status,
        });
    }

    // Nothing transitions into PENDING_PAYMENT, so the hold deadline always goes.
    if !queries::update_booking_status(&tx, id, status, None, &now)? {
        return Err(AppError::booking_not_found(id));
    }
    tx.commit()?;

    tracing::info!(booking_id = %id, from = %booking.status, to = %status, "booking status changed");
    booking.status = status;
    booking.expires_at = None;
    booking.updated_at = now;
    Ok(booking)
}

/// Writes lapsed holds back as EXPIRED. Returns how many rows changed.
pub fn expire_stale_holds(conn: &Connection, now: NaiveDateTime) -> Result<usize, AppError> {
    let count = queries::expire_holds(conn, &now, None)?;
    if count > 0 {
        tracing::info!(count, "expired stale holds");
    }
    Ok(count)
}

// ── Reassignment ──

pub fn reassign(
    conn: &mut Connection,
    id: &str,
    date: NaiveDate,
    slot: Slot,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let now = whole_seconds(now);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut booking = get_booking(&tx, id, false)?;

    let current = booking.effective_status(now);
    if current.is_terminal() {
        return Err(AppError::NotMovable(current));
    }
    if booking.booking_date == date && booking.slot == slot {
        return Ok(booking);
    }

    ensure_free(&tx, date, slot, now, Some(id))?;
    let moved = slot_write(queries::update_booking_slot(&tx, id, &date, slot, &now), date, slot)?;
    if !moved {
        return Err(AppError::booking_not_found(id));
    }
    tx.commit()?;

    tracing::info!(
        booking_id = %id,
        from_date = %booking.booking_date,
        from_slot = %booking.slot,
        to_date = %date,
        to_slot = %slot,
        "booking reassigned"
    );
    booking.booking_date = date;
    booking.slot = slot;
    booking.updated_at = now;
    Ok(booking)
}

// ── Notes, deletion, restore ──

fn clean_notes(notes: Option<&str>) -> Option<String> {
    notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

pub fn update_notes(
    conn: &Connection,
    id: &str,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let notes = clean_notes(notes);
    if !queries::update_booking_notes(conn, id, notes.as_deref(), &now)? {
        return Err(AppError::booking_not_found(id));
    }
    get_booking(conn, id, false)
}

pub fn soft_delete(conn: &Connection, id: &str, now: NaiveDateTime) -> Result<(), AppError> {
    if !queries::soft_delete_booking(conn, id, &now)? {
        return Err(AppError::booking_not_found(id));
    }
    tracing::info!(booking_id = %id, "booking soft-deleted");
    Ok(())
}

/// Brings a soft-deleted booking back. A hold that lapsed while deleted comes
/// back as EXPIRED; anything else that would occupy its slot must find it free.
pub fn restore(conn: &mut Connection, id: &str, now: NaiveDateTime) -> Result<Booking, AppError> {
    let now = whole_seconds(now);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut booking = match queries::get_booking_by_id(&tx, id)? {
        Some(b) if b.deleted_at.is_some() => b,
        _ => return Err(AppError::NotFound(format!("deleted booking {id}"))),
    };

    if booking.hold_lapsed(now) {
        booking.status = BookingStatus::Expired;
        booking.expires_at = None;
    } else if booking.status.may_occupy() {
        ensure_free(&tx, booking.booking_date, booking.slot, now, Some(id))?;
    }

    let restored = slot_write(
        queries::restore_booking(&tx, id, booking.status, booking.expires_at.as_ref(), &now),
        booking.booking_date,
        booking.slot,
    )?;
    if !restored {
        return Err(AppError::NotFound(format!("deleted booking {id}")));
    }
    tx.commit()?;

    tracing::info!(booking_id = %id, status = %booking.status, "booking restored");
    booking.deleted_at = None;
    booking.updated_at = now;
    Ok(booking)
}

/// Physical removal, for admin cleanup only.
pub fn purge(conn: &Connection, id: &str) -> Result<(), AppError> {
    if !queries::delete_booking(conn, id)? {
        return Err(AppError::booking_not_found(id));
    }
    tracing::warn!(booking_id = %id, "booking purged");
    Ok(())
}

// ── Maintenance ──

pub fn block_maintenance(
    conn: &mut Connection,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<MaintenanceOutcome, AppError> {
    let now = whole_seconds(now);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut outcome = MaintenanceOutcome {
        date,
        blocked: vec![],
        already_blocked: vec![],
        occupied: vec![],
    };

    for slot in Slot::ALL {
        expire_slot_holds(&tx, date, slot, now)?;
        match occupant(&tx, date, slot, now, None)? {
            Some(b) if b.status == BookingStatus::Maintenance => outcome.already_blocked.push(slot),
            Some(_) => outcome.occupied.push(slot),
            None => {
                let block = maintenance_row(date, slot, now);
                slot_write(queries::insert_booking(&tx, &block), date, slot)?;
                outcome.blocked.push(slot);
            }
        }
    }
    tx.commit()?;

    tracing::info!(
        date = %date,
        blocked = outcome.blocked.len(),
        occupied = outcome.occupied.len(),
        "maintenance block applied"
    );
    Ok(outcome)
}

fn maintenance_row(date: NaiveDate, slot: Slot, now: NaiveDateTime) -> Booking {
    Booking {
        id: Uuid::new_v4().to_string(),
        guest_name: "Maintenance".to_string(),
        guest_email: String::new(),
        guest_whatsapp: String::new(),
        booking_date: date,
        slot,
        is_couple_promo: false,
        total_price: 0,
        status: BookingStatus::Maintenance,
        expires_at: None,
        admin_notes: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn unblock_maintenance(
    conn: &Connection,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<usize, AppError> {
    let count = queries::soft_delete_maintenance(conn, &date, &now)?;
    tracing::info!(date = %date, count, "maintenance block removed");
    Ok(count)
}

// ── Dashboard ──

pub fn dashboard_stats(conn: &Connection, now: NaiveDateTime) -> Result<DashboardStats, AppError> {
    let by_status = queries::count_by_status(conn)?
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();

    let candidates = queries::get_potential_occupants(conn, None, None)?;
    let active_holds = candidates
        .iter()
        .filter(|b| b.status == BookingStatus::PendingPayment && b.occupies(now))
        .count();
    let lapsed_holds = candidates.iter().filter(|b| b.hold_lapsed(now)).count();
    let upcoming_occupied = candidates
        .iter()
        .filter(|b| {
            b.booking_date >= now.date() && b.status != BookingStatus::Maintenance && b.occupies(now)
        })
        .count();

    let paid = queries::get_paid_bookings(conn)?;
    Ok(DashboardStats {
        by_status,
        active_holds,
        lapsed_holds,
        upcoming_occupied,
        collected: paid.iter().map(Booking::amount_paid).sum(),
        outstanding: paid.iter().map(Booking::balance_due).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::booking::deposit_for;
    use crate::models::PricingTable;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> NaiveDateTime {
        ts("2026-03-01 10:00:00")
    }

    fn hold() -> Duration {
        Duration::hours(4)
    }

    fn guest() -> GuestContact {
        GuestContact {
            name: "Ana López".to_string(),
            email: "ana@example.com".to_string(),
            whatsapp: "+52 55 1234 5678".to_string(),
        }
    }

    fn request(date: &str, slot: Slot) -> NewBooking {
        NewBooking {
            contact: guest(),
            booking_date: d(date),
            slot,
            is_couple_promo: false,
        }
    }

    fn manual(date: &str, slot: Slot, status: BookingStatus) -> ManualBooking {
        ManualBooking {
            contact: guest(),
            booking_date: d(date),
            slot,
            is_couple_promo: false,
            total_price: 4200,
            status,
            admin_notes: Some("paid cash".to_string()),
        }
    }

    fn occupying_rows(conn: &Connection, date: NaiveDate, slot: Slot, now: NaiveDateTime) -> usize {
        queries::get_potential_occupants(conn, Some((date, slot)), None)
            .unwrap()
            .iter()
            .filter(|b| b.occupies(now))
            .count()
    }

    #[test]
    fn test_create_prices_and_holds() {
        let mut conn = setup_db();
        // 2026-03-20 is a Friday
        let booking = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();

        assert_eq!(booking.total_price, PricingTable::default().general.weekday.day);
        assert_eq!(booking.status, BookingStatus::PendingPayment);
        assert_eq!(booking.expires_at, Some(ts("2026-03-01 14:00:00")));
        assert_eq!(booking.guest_whatsapp, "+525512345678");

        let stored = get_booking(&conn, &booking.id, false).unwrap();
        assert_eq!(stored.total_price, booking.total_price);
        assert_eq!(stored.expires_at, booking.expires_at);
    }

    #[test]
    fn test_couple_promo_uses_couple_table() {
        let mut conn = setup_db();
        let mut req = request("2026-03-21", Slot::Night);
        req.is_couple_promo = true;
        let booking = create_booking(&mut conn, &req, hold(), now()).unwrap();
        assert_eq!(booking.total_price, PricingTable::default().couple.saturday.night);
    }

    #[test]
    fn test_create_uses_current_pricing() {
        let mut conn = setup_db();
        let mut table = PricingTable::default();
        table.general.weekday.night = 4321;
        pricing::save_pricing(&conn, &table, now()).unwrap();

        let booking = create_booking(&mut conn, &request("2026-03-20", Slot::Night), hold(), now()).unwrap();
        assert_eq!(booking.total_price, 4321);
    }

    #[test]
    fn test_second_create_conflicts() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();

        let err = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict { slot: Slot::Day, .. }));

        // The other half of the day is still free.
        assert!(create_booking(&mut conn, &request("2026-03-20", Slot::Night), hold(), now()).is_ok());
    }

    #[test]
    fn test_lapsed_hold_frees_slot() {
        let mut conn = setup_db();
        let first = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();

        let later = now() + hold() + Duration::seconds(1);
        assert!(list_unavailable_slots(&conn, later, None).unwrap().is_empty());

        let second = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), later).unwrap();
        assert_ne!(first.id, second.id);

        let first = get_booking(&conn, &first.id, false).unwrap();
        assert_eq!(first.status, BookingStatus::Expired);
        assert_eq!(first.expires_at, None);
    }

    #[test]
    fn test_hold_at_exact_deadline_is_released() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        assert_eq!(list_unavailable_slots(&conn, now() + hold() - Duration::seconds(1), None).unwrap().len(), 1);
        assert!(list_unavailable_slots(&conn, now() + hold(), None).unwrap().is_empty());
    }

    #[test]
    fn test_returned_booking_matches_stored_row_to_the_second() {
        let mut conn = setup_db();
        let fractional = d("2026-03-01").and_hms_milli_opt(10, 0, 0, 700).unwrap();

        let created = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), fractional).unwrap();
        assert_eq!(created.expires_at, Some(ts("2026-03-01 14:00:00")));
        assert_eq!(created.created_at, now());
        assert_eq!(get_booking(&conn, &created.id, false).unwrap(), created);

        let later = d("2026-03-01").and_hms_milli_opt(11, 0, 0, 250).unwrap();
        let confirmed = set_status(&mut conn, &created.id, BookingStatus::Confirmed, later).unwrap();
        assert_eq!(get_booking(&conn, &created.id, false).unwrap(), confirmed);
    }

    fn logged_expiries(conn: &Connection) -> Vec<String> {
        queries::get_booking_events_since(conn, 0, 100)
            .unwrap()
            .into_iter()
            .filter(|e| e.kind == "holds_expired")
            .map(|e| e.detail)
            .collect()
    }

    #[test]
    fn test_slot_expiry_is_logged() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        create_booking(&mut conn, &request("2026-04-01", Slot::Night), hold(), now()).unwrap();

        // Still held: the failed create rolls back without logging anything
        assert!(create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).is_err());
        assert!(logged_expiries(&conn).is_empty());

        let later = now() + Duration::hours(5);
        create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), later).unwrap();
        assert_eq!(logged_expiries(&conn), vec!["1 on 2026-03-20 DAY"]);

        let outcome = block_maintenance(&mut conn, d("2026-04-01"), later).unwrap();
        assert_eq!(outcome.blocked, vec![Slot::Day, Slot::Night]);
        assert_eq!(
            logged_expiries(&conn),
            vec!["1 on 2026-03-20 DAY", "1 on 2026-04-01 NIGHT"]
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut conn = setup_db();
        let mut req = request("2026-02-27", Slot::Day);
        req.contact.email = "nope".to_string();

        match create_booking(&mut conn, &req, hold(), now()) {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field).collect();
                assert_eq!(names, vec!["guest_email", "booking_date"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(list_bookings(&conn, &BookingFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_same_day_booking_allowed() {
        let mut conn = setup_db();
        assert!(create_booking(&mut conn, &request("2026-03-01", Slot::Night), hold(), now()).is_ok());
    }

    #[test]
    fn test_set_status_keeps_price_and_occupancy() {
        let mut conn = setup_db();
        let booking = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();

        let reserved = set_status(&mut conn, &booking.id, BookingStatus::Reserved, now()).unwrap();
        assert_eq!(reserved.expires_at, None);

        let confirmed = set_status(&mut conn, &booking.id, BookingStatus::Confirmed, now()).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.total_price, booking.total_price);

        let stored = get_booking(&conn, &booking.id, false).unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.expires_at, None);
        assert_eq!(stored.total_price, booking.total_price);

        // Still occupied long after the original hold deadline.
        let much_later = now() + Duration::days(7);
        assert_eq!(
            list_unavailable_slots(&conn, much_later, None).unwrap(),
            vec![UnavailableSlot { date: d("2026-03-20"), slot: Slot::Day }]
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut conn = setup_db();
        let booking = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        set_status(&mut conn, &booking.id, BookingStatus::Cancelled, now()).unwrap();

        let err = set_status(&mut conn, &booking.id, BookingStatus::Confirmed, now()).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition { from: BookingStatus::Cancelled, to: BookingStatus::Confirmed }
        ));

        let err = set_status(&mut conn, &booking.id, BookingStatus::Maintenance, now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_lapsed_hold_cannot_be_promoted() {
        let mut conn = setup_db();
        let booking = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        let later = now() + Duration::hours(5);

        let err = set_status(&mut conn, &booking.id, BookingStatus::Reserved, later).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { from: BookingStatus::Expired, .. }));
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut conn = setup_db();
        let booking = create_manual_booking(
            &mut conn,
            &manual("2026-03-20", Slot::Day, BookingStatus::Confirmed),
            hold(),
            now(),
        )
        .unwrap();
        let same = set_status(&mut conn, &booking.id, BookingStatus::Confirmed, now()).unwrap();
        assert_eq!(same.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_set_status_not_found() {
        let mut conn = setup_db();
        let err = set_status(&mut conn, "missing", BookingStatus::Confirmed, now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let booking = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        soft_delete(&conn, &booking.id, now()).unwrap();
        let err = set_status(&mut conn, &booking.id, BookingStatus::Reserved, now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_maintenance_block_is_idempotent() {
        let mut conn = setup_db();
        let first = block_maintenance(&mut conn, d("2026-04-01"), now()).unwrap();
        assert_eq!(first.blocked, vec![Slot::Day, Slot::Night]);

        let second = block_maintenance(&mut conn, d("2026-04-01"), now()).unwrap();
        assert!(second.blocked.is_empty());
        assert_eq!(second.already_blocked, vec![Slot::Day, Slot::Night]);

        let slots = list_unavailable_slots(&conn, now(), None).unwrap();
        assert_eq!(
            slots,
            vec![
                UnavailableSlot { date: d("2026-04-01"), slot: Slot::Day },
                UnavailableSlot { date: d("2026-04-01"), slot: Slot::Night },
            ]
        );

        let rows = list_bookings(&conn, &BookingFilter::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|b| b.total_price == 0 && b.expires_at.is_none()));
    }

    #[test]
    fn test_maintenance_skips_booked_slot() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request("2026-04-01", Slot::Day), hold(), now()).unwrap();

        let outcome = block_maintenance(&mut conn, d("2026-04-01"), now()).unwrap();
        assert_eq!(outcome.occupied, vec![Slot::Day]);
        assert_eq!(outcome.blocked, vec![Slot::Night]);
    }

    #[test]
    fn test_unblock_maintenance_frees_date() {
        let mut conn = setup_db();
        block_maintenance(&mut conn, d("2026-04-01"), now()).unwrap();
        assert_eq!(unblock_maintenance(&conn, d("2026-04-01"), now()).unwrap(), 2);
        assert!(list_unavailable_slots(&conn, now(), None).unwrap().is_empty());
        assert_eq!(unblock_maintenance(&conn, d("2026-04-01"), now()).unwrap(), 0);

        assert!(create_booking(&mut conn, &request("2026-04-01", Slot::Day), hold(), now()).is_ok());
    }

    #[test]
    fn test_maintenance_can_be_cancelled() {
        let mut conn = setup_db();
        block_maintenance(&mut conn, d("2026-04-01"), now()).unwrap();
        let rows = list_bookings(&conn, &BookingFilter::default()).unwrap();
        set_status(&mut conn, &rows[0].id, BookingStatus::Cancelled, now()).unwrap();
        assert_eq!(list_unavailable_slots(&conn, now(), None).unwrap().len(), 1);
    }

    #[test]
    fn test_reassign_onto_occupied_slot_fails() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        create_booking(&mut conn, &request("2026-03-21", Slot::Night), hold(), now()).unwrap();

        let err = reassign(&mut conn, &a.id, d("2026-03-21"), Slot::Night, now()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict { .. }));

        let stored = get_booking(&conn, &a.id, false).unwrap();
        assert_eq!(stored.booking_date, d("2026-03-20"));
        assert_eq!(stored.slot, Slot::Day);
    }

    #[test]
    fn test_reassign_moves_and_frees() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        set_status(&mut conn, &a.id, BookingStatus::Reserved, now()).unwrap();

        let moved = reassign(&mut conn, &a.id, d("2026-03-22"), Slot::Night, now()).unwrap();
        assert_eq!(moved.total_price, a.total_price);
        assert_eq!(
            list_unavailable_slots(&conn, now(), None).unwrap(),
            vec![UnavailableSlot { date: d("2026-03-22"), slot: Slot::Night }]
        );
        assert!(create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).is_ok());
    }

    #[test]
    fn test_reassign_over_lapsed_hold() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request("2026-03-21", Slot::Day), hold(), now()).unwrap();
        let b = create_manual_booking(
            &mut conn,
            &manual("2026-03-20", Slot::Day, BookingStatus::Confirmed),
            hold(),
            now(),
        )
        .unwrap();

        let later = now() + Duration::hours(5);
        assert!(reassign(&mut conn, &b.id, d("2026-03-21"), Slot::Day, later).is_ok());
    }

    #[test]
    fn test_terminal_booking_cannot_move() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        let later = now() + Duration::hours(5);
        let err = reassign(&mut conn, &a.id, d("2026-03-25"), Slot::Day, later).unwrap_err();
        assert!(matches!(err, AppError::NotMovable(BookingStatus::Expired)));
    }

    #[test]
    fn test_soft_delete_excludes_and_restore_checks() {
        let mut conn = setup_db();
        let a = create_manual_booking(
            &mut conn,
            &manual("2026-03-20", Slot::Day, BookingStatus::Confirmed),
            hold(),
            now(),
        )
        .unwrap();

        soft_delete(&conn, &a.id, now()).unwrap();
        assert!(list_unavailable_slots(&conn, now(), None).unwrap().is_empty());
        assert!(matches!(soft_delete(&conn, &a.id, now()), Err(AppError::NotFound(_))));
        assert!(get_booking(&conn, &a.id, true).unwrap().deleted_at.is_some());

        let b = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        let err = restore(&mut conn, &a.id, now()).unwrap_err();
        assert!(matches!(err, AppError::SlotConflict { .. }));

        soft_delete(&conn, &b.id, now()).unwrap();
        let restored = restore(&mut conn, &a.id, now()).unwrap();
        assert_eq!(restored.status, BookingStatus::Confirmed);
        assert_eq!(list_unavailable_slots(&conn, now(), None).unwrap().len(), 1);
    }

    #[test]
    fn test_restore_lapsed_hold_comes_back_expired() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        soft_delete(&conn, &a.id, now()).unwrap();

        let later = now() + Duration::hours(6);
        create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), later).unwrap();

        let restored = restore(&mut conn, &a.id, later).unwrap();
        assert_eq!(restored.status, BookingStatus::Expired);
        assert_eq!(get_booking(&conn, &a.id, false).unwrap().expires_at, None);
    }

    #[test]
    fn test_purge() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        purge(&conn, &a.id).unwrap();
        assert!(matches!(get_booking(&conn, &a.id, true), Err(AppError::NotFound(_))));
        assert!(matches!(purge(&conn, &a.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_update_notes() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        let updated = update_notes(&conn, &a.id, Some("  arrives late  "), now()).unwrap();
        assert_eq!(updated.admin_notes.as_deref(), Some("arrives late"));
        let cleared = update_notes(&conn, &a.id, Some("   "), now()).unwrap();
        assert_eq!(cleared.admin_notes, None);
    }

    #[test]
    fn test_expire_stale_holds() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        create_booking(&mut conn, &request("2026-03-20", Slot::Night), Duration::hours(8), now()).unwrap();
        create_manual_booking(
            &mut conn,
            &manual("2026-03-21", Slot::Day, BookingStatus::Reserved),
            hold(),
            now(),
        )
        .unwrap();

        let later = now() + Duration::hours(5);
        assert_eq!(expire_stale_holds(&conn, later).unwrap(), 1);
        assert_eq!(expire_stale_holds(&conn, later).unwrap(), 0);

        let expired = list_bookings(
            &conn,
            &BookingFilter {
                status: Some(BookingStatus::Expired),
                ..BookingFilter::default()
            },
        )
        .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].slot, Slot::Day);
        assert_eq!(list_unavailable_slots(&conn, later, None).unwrap().len(), 2);
    }

    #[test]
    fn test_manual_booking() {
        let mut conn = setup_db();
        let confirmed = create_manual_booking(
            &mut conn,
            &manual("2026-03-20", Slot::Day, BookingStatus::Confirmed),
            hold(),
            now(),
        )
        .unwrap();
        assert_eq!(confirmed.total_price, 4200);
        assert_eq!(confirmed.expires_at, None);
        assert_eq!(confirmed.admin_notes.as_deref(), Some("paid cash"));

        let pending = create_manual_booking(
            &mut conn,
            &manual("2026-03-20", Slot::Night, BookingStatus::PendingPayment),
            hold(),
            now(),
        )
        .unwrap();
        assert_eq!(pending.expires_at, Some(now() + hold()));

        let err = create_manual_booking(
            &mut conn,
            &manual("2026-03-20", Slot::Day, BookingStatus::Reserved),
            hold(),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::SlotConflict { .. }));

        // Historical entries don't hold the slot.
        assert!(create_manual_booking(
            &mut conn,
            &manual("2026-03-20", Slot::Day, BookingStatus::Completed),
            hold(),
            now(),
        )
        .is_ok());
    }

    #[test]
    fn test_manual_booking_rejects_bad_input() {
        let mut conn = setup_db();
        let mut req = manual("2026-03-20", Slot::Day, BookingStatus::Maintenance);
        req.total_price = -1;
        match create_manual_booking(&mut conn, &req, hold(), now()) {
            Err(AppError::Validation(fields)) => assert_eq!(fields.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_index_rejects_double_booking_that_skips_the_check() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();

        let mut rogue = a.clone();
        rogue.id = "rogue".to_string();
        rogue.status = BookingStatus::Confirmed;
        rogue.expires_at = None;
        let err = queries::insert_booking(&conn, &rogue).unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(matches!(
            slot_write(Err::<(), _>(err), a.booking_date, a.slot),
            Err(AppError::SlotConflict { .. })
        ));
    }

    #[test]
    fn test_occupancy_stays_exclusive() {
        let mut conn = setup_db();
        let dates = ["2026-03-20", "2026-03-21", "2026-03-22"];
        let mut clock = now();
        let mut ids = vec![];

        for round in 0..12 {
            let date = dates[round % dates.len()];
            let slot = if round % 2 == 0 { Slot::Day } else { Slot::Night };
            if let Ok(b) = create_booking(&mut conn, &request(date, slot), hold(), clock) {
                ids.push(b.id);
            }
            let _ = block_maintenance(&mut conn, d(dates[(round + 1) % dates.len()]), clock);
            if let Some(id) = ids.get(round / 2) {
                let _ = reassign(&mut conn, id, d(dates[(round + 2) % dates.len()]), slot.other(), clock);
                let _ = set_status(&mut conn, id, BookingStatus::Reserved, clock);
            }
            if round % 4 == 3 {
                let _ = unblock_maintenance(&conn, d(date), clock);
            }
            clock += Duration::hours(3);

            for date in dates {
                for slot in Slot::ALL {
                    assert!(occupying_rows(&conn, d(date), slot, clock) <= 1);
                }
            }
        }
    }

    #[test]
    fn test_calendar_summary() {
        let mut conn = setup_db();
        block_maintenance(&mut conn, d("2026-04-01"), now()).unwrap();
        create_booking(&mut conn, &request("2026-04-02", Slot::Day), hold(), now()).unwrap();

        let days = calendar(&conn, d("2026-04-01"), d("2026-04-03"), now()).unwrap();
        let kinds: Vec<_> = days.iter().map(|c| c.availability).collect();
        use crate::models::DayAvailability::*;
        assert_eq!(kinds, vec![Full, Partial, Free]);

        assert!(calendar(&conn, d("2026-04-03"), d("2026-04-01"), now()).is_err());
        assert!(calendar(&conn, d("2026-01-01"), d("2027-01-02"), now()).is_err());
    }

    #[test]
    fn test_list_unavailable_from_date() {
        let mut conn = setup_db();
        create_manual_booking(
            &mut conn,
            &manual("2026-02-10", Slot::Day, BookingStatus::Confirmed),
            hold(),
            now(),
        )
        .unwrap();
        create_booking(&mut conn, &request("2026-03-10", Slot::Day), hold(), now()).unwrap();

        assert_eq!(list_unavailable_slots(&conn, now(), None).unwrap().len(), 2);
        assert_eq!(list_unavailable_slots(&conn, now(), Some(now().date())).unwrap().len(), 1);
    }

    #[test]
    fn test_list_bookings_order_and_filters() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        let b = create_booking(&mut conn, &request("2026-03-21", Slot::Day), hold(), now() + Duration::minutes(1)).unwrap();
        soft_delete(&conn, &a.id, now()).unwrap();

        let visible = list_bookings(&conn, &BookingFilter::default()).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, b.id);

        let all = list_bookings(
            &conn,
            &BookingFilter {
                include_deleted: true,
                ..BookingFilter::default()
            },
        )
        .unwrap();
        assert_eq!(all.iter().map(|x| x.id.as_str()).collect::<Vec<_>>(), vec![b.id.as_str(), a.id.as_str()]);

        let recent = list_bookings(
            &conn,
            &BookingFilter {
                created_after: Some(now()),
                include_deleted: true,
                ..BookingFilter::default()
            },
        )
        .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_dashboard_stats() {
        let mut conn = setup_db();
        let a = create_booking(&mut conn, &request("2026-03-20", Slot::Day), hold(), now()).unwrap();
        set_status(&mut conn, &a.id, BookingStatus::Reserved, now()).unwrap();
        create_booking(&mut conn, &request("2026-03-20", Slot::Night), hold(), now()).unwrap();
        create_manual_booking(
            &mut conn,
            &manual("2026-03-21", Slot::Day, BookingStatus::Confirmed),
            hold(),
            now(),
        )
        .unwrap();
        block_maintenance(&mut conn, d("2026-04-01"), now()).unwrap();

        let stats = dashboard_stats(&conn, now()).unwrap();
        assert_eq!(stats.by_status.get("RESERVED"), Some(&1));
        assert_eq!(stats.by_status.get("MAINTENANCE"), Some(&2));
        assert_eq!(stats.active_holds, 1);
        assert_eq!(stats.lapsed_holds, 0);
        assert_eq!(stats.upcoming_occupied, 3);
        assert_eq!(stats.collected, deposit_for(a.total_price) + 4200);
        assert_eq!(stats.outstanding, a.total_price - deposit_for(a.total_price));

        let later = now() + Duration::hours(5);
        let stats = dashboard_stats(&conn, later).unwrap();
        assert_eq!(stats.active_holds, 0);
        assert_eq!(stats.lapsed_holds, 1);
    }
}
