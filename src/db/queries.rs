use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Booking, BookingEvent, BookingStatus, Slot};

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, guest_name, guest_email, guest_whatsapp, booking_date, slot, \
     is_couple_promo, total_price, status, expires_at, admin_notes, deleted_at, created_at, updated_at";

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("bad timestamp: {s}"))
}

/// Statuses that can hold a slot, as a SQL list literal.
fn may_occupy_sql() -> String {
    BookingStatus::ALL
        .iter()
        .filter(|s| s.may_occupy())
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            booking.id,
            booking.guest_name,
            booking.guest_email,
            booking.guest_whatsapp,
            format_date(&booking.booking_date),
            booking.slot.as_str(),
            booking.is_couple_promo,
            booking.total_price,
            booking.status.as_str(),
            booking.expires_at.as_ref().map(format_ts),
            booking.admin_notes,
            booking.deleted_at.as_ref().map(format_ts),
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

/// Looks a booking up by id, soft-deleted rows included.
pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let row = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    row.transpose()
}

/// Non-deleted rows whose status can hold a slot, optionally limited to one
/// (date, slot) or to dates from `from` onward. Whether each row actually
/// occupies its slot is decided by `Booking::occupies`.
pub fn get_potential_occupants(
    conn: &Connection,
    at: Option<(NaiveDate, Slot)>,
    from: Option<NaiveDate>,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE deleted_at IS NULL AND status IN ({})",
        may_occupy_sql()
    );
    let mut args: Vec<Box<dyn ToSql>> = vec![];

    if let Some((date, slot)) = at {
        args.push(Box::new(format_date(&date)));
        sql.push_str(&format!(" AND booking_date = ?{}", args.len()));
        args.push(Box::new(slot.as_str()));
        sql.push_str(&format!(" AND slot = ?{}", args.len()));
    }
    if let Some(from) = from {
        args.push(Box::new(format_date(&from)));
        sql.push_str(&format!(" AND booking_date >= ?{}", args.len()));
    }
    sql.push_str(" ORDER BY booking_date ASC, slot ASC");

    query_bookings(conn, &sql, &args)
}

/// Moves lapsed holds to EXPIRED, either everywhere or on one (date, slot).
pub fn expire_holds(
    conn: &Connection,
    now: &NaiveDateTime,
    at: Option<(NaiveDate, Slot)>,
) -> anyhow::Result<usize> {
    let now = format_ts(now);
    let count = match at {
        Some((date, slot)) => conn.execute(
            "UPDATE bookings SET status = 'EXPIRED', expires_at = NULL, updated_at = ?1
             WHERE status = 'PENDING_PAYMENT' AND expires_at <= ?1 AND deleted_at IS NULL
               AND booking_date = ?2 AND slot = ?3",
            params![now, format_date(&date), slot.as_str()],
        )?,
        None => conn.execute(
            "UPDATE bookings SET status = 'EXPIRED', expires_at = NULL, updated_at = ?1
             WHERE status = 'PENDING_PAYMENT' AND expires_at <= ?1 AND deleted_at IS NULL",
            params![now],
        )?,
    };
    Ok(count)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    expires_at: Option<&NaiveDateTime>,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, expires_at = ?2, updated_at = ?3
         WHERE id = ?4 AND deleted_at IS NULL",
        params![status.as_str(), expires_at.map(format_ts), format_ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_slot(
    conn: &Connection,
    id: &str,
    date: &NaiveDate,
    slot: Slot,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET booking_date = ?1, slot = ?2, updated_at = ?3
         WHERE id = ?4 AND deleted_at IS NULL",
        params![format_date(date), slot.as_str(), format_ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_notes(
    conn: &Connection,
    id: &str,
    notes: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET admin_notes = ?1, updated_at = ?2
         WHERE id = ?3 AND deleted_at IS NULL",
        params![notes, format_ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn soft_delete_booking(conn: &Connection, id: &str, now: &NaiveDateTime) -> anyhow::Result<bool> {
    let now = format_ts(now);
    let count = conn.execute(
        "UPDATE bookings SET deleted_at = ?1, updated_at = ?1
         WHERE id = ?2 AND deleted_at IS NULL",
        params![now, id],
    )?;
    Ok(count > 0)
}

/// Clears `deleted_at`, writing the status the row comes back with in the
/// same statement so the active-slot index sees the final row.
pub fn restore_booking(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    expires_at: Option<&NaiveDateTime>,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET deleted_at = NULL, status = ?1, expires_at = ?2, updated_at = ?3
         WHERE id = ?4 AND deleted_at IS NOT NULL",
        params![status.as_str(), expires_at.map(format_ts), format_ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn soft_delete_maintenance(
    conn: &Connection,
    date: &NaiveDate,
    now: &NaiveDateTime,
) -> anyhow::Result<usize> {
    let now = format_ts(now);
    let count = conn.execute(
        "UPDATE bookings SET deleted_at = ?1, updated_at = ?1
         WHERE booking_date = ?2 AND status = 'MAINTENANCE' AND deleted_at IS NULL",
        params![now, format_date(date)],
    )?;
    Ok(count)
}

#[derive(Debug, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub created_after: Option<NaiveDateTime>,
    pub include_deleted: bool,
    pub limit: i64,
}

impl Default for BookingFilter {
    fn default() -> Self {
        Self {
            status: None,
            from: None,
            to: None,
            created_after: None,
            include_deleted: false,
            limit: 100,
        }
    }
}

/// Admin listing, newest first.
pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut clauses: Vec<String> = vec![];
    let mut args: Vec<Box<dyn ToSql>> = vec![];

    if !filter.include_deleted {
        clauses.push("deleted_at IS NULL".to_string());
    }
    if let Some(status) = filter.status {
        args.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", args.len()));
    }
    if let Some(from) = filter.from {
        args.push(Box::new(format_date(&from)));
        clauses.push(format!("booking_date >= ?{}", args.len()));
    }
    if let Some(to) = filter.to {
        args.push(Box::new(format_date(&to)));
        clauses.push(format!("booking_date <= ?{}", args.len()));
    }
    if let Some(created_after) = filter.created_after {
        args.push(Box::new(format_ts(&created_after)));
        clauses.push(format!("created_at > ?{}", args.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    args.push(Box::new(filter.limit));
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings{where_sql} ORDER BY created_at DESC, id ASC LIMIT ?{}",
        args.len()
    );

    query_bookings(conn, &sql, &args)
}

/// Non-deleted booking counts per stored status.
pub fn count_by_status(conn: &Connection) -> anyhow::Result<Vec<(BookingStatus, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM bookings WHERE deleted_at IS NULL GROUP BY status ORDER BY status",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        let (status, count) = row?;
        let status = BookingStatus::parse(&status)
            .with_context(|| format!("unknown booking status: {status}"))?;
        counts.push((status, count));
    }
    Ok(counts)
}

/// Non-deleted bookings that have taken money: RESERVED, CONFIRMED, COMPLETED.
pub fn get_paid_bookings(conn: &Connection) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE deleted_at IS NULL AND status IN ('RESERVED', 'CONFIRMED', 'COMPLETED')"
    );
    query_bookings(conn, &sql, &[])
}

fn query_bookings(
    conn: &Connection,
    sql: &str,
    args: &[Box<dyn ToSql>],
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let params_refs: Vec<&dyn ToSql> = args.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let booking_date_str: String = row.get(4)?;
    let slot_str: String = row.get(5)?;
    let status_str: String = row.get(8)?;
    let expires_at_str: Option<String> = row.get(9)?;
    let deleted_at_str: Option<String> = row.get(11)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    Ok(Booking {
        id: row.get(0)?,
        guest_name: row.get(1)?,
        guest_email: row.get(2)?,
        guest_whatsapp: row.get(3)?,
        booking_date: NaiveDate::parse_from_str(&booking_date_str, DATE_FORMAT)
            .with_context(|| format!("bad booking date: {booking_date_str}"))?,
        slot: Slot::parse(&slot_str).with_context(|| format!("unknown slot: {slot_str}"))?,
        is_couple_promo: row.get(6)?,
        total_price: row.get(7)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status: {status_str}"))?,
        expires_at: expires_at_str.as_deref().map(parse_ts).transpose()?,
        admin_notes: row.get(10)?,
        deleted_at: deleted_at_str.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Settings ──

pub struct StoredSetting {
    pub value: String,
    pub version: i64,
    pub updated_at: String,
}

pub fn get_setting(conn: &Connection, key: &str) -> anyhow::Result<Option<StoredSetting>> {
    let setting = conn
        .query_row(
            "SELECT value, version, updated_at FROM settings WHERE key = ?1",
            params![key],
            |row| {
                Ok(StoredSetting {
                    value: row.get(0)?,
                    version: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(setting)
}

/// Upserts a setting and returns its new version.
pub fn put_setting(
    conn: &Connection,
    key: &str,
    value: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO settings (key, value, version, updated_at) VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           version = settings.version + 1,
           updated_at = excluded.updated_at",
        params![key, value, format_ts(now)],
    )?;
    let version = conn.query_row(
        "SELECT version FROM settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )?;
    Ok(version)
}

// ── Booking Events ──

pub fn insert_booking_event(
    conn: &Connection,
    booking_id: Option<&str>,
    kind: &str,
    detail: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO booking_events (booking_id, kind, detail, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![booking_id, kind, detail, format_ts(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn latest_booking_event_id(conn: &Connection) -> anyhow::Result<i64> {
    let id = conn.query_row("SELECT COALESCE(MAX(id), 0) FROM booking_events", [], |row| {
        row.get(0)
    })?;
    Ok(id)
}

pub fn get_booking_events_since(
    conn: &Connection,
    since_id: i64,
    limit: i64,
) -> anyhow::Result<Vec<BookingEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, kind, detail, created_at
         FROM booking_events WHERE id > ?1
         ORDER BY id ASC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![since_id, limit], |row| {
        Ok(BookingEvent {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            kind: row.get(2)?,
            detail: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}
