use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Slot {
    #[serde(alias = "day")]
    Day,
    #[serde(alias = "night")]
    Night,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Day, Slot::Night];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Day => "DAY",
            Slot::Night => "NIGHT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DAY" => Some(Slot::Day),
            "NIGHT" => Some(Slot::Night),
            _ => None,
        }
    }

    pub fn other(&self) -> Slot {
        match self {
            Slot::Day => Slot::Night,
            Slot::Night => Slot::Day,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingPayment,
    Reserved,
    Confirmed,
    Completed,
    Cancelled,
    Maintenance,
    Expired,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 7] = [
        BookingStatus::PendingPayment,
        BookingStatus::Reserved,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Maintenance,
        BookingStatus::Expired,
    ];

    /// Statuses that hold their slot regardless of time.
    pub const ALWAYS_OCCUPYING: [BookingStatus; 3] = [
        BookingStatus::Reserved,
        BookingStatus::Confirmed,
        BookingStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::Reserved => "RESERVED",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Maintenance => "MAINTENANCE",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING_PAYMENT" => Some(BookingStatus::PendingPayment),
            "RESERVED" => Some(BookingStatus::Reserved),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "MAINTENANCE" => Some(BookingStatus::Maintenance),
            "EXPIRED" => Some(BookingStatus::Expired),
            _ => None,
        }
    }

    /// Whether a row in this status can ever hold its slot.
    pub fn may_occupy(&self) -> bool {
        *self == BookingStatus::PendingPayment || Self::ALWAYS_OCCUPYING.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Expired
        )
    }

    /// Admin-driven transitions. MAINTENANCE, PENDING_PAYMENT and EXPIRED are
    /// never reachable from another status.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Reserved)
                | (PendingPayment, Confirmed)
                | (PendingPayment, Cancelled)
                | (Reserved, Confirmed)
                | (Reserved, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Maintenance, Cancelled)
        )
    }

    /// Statuses an admin may pick when entering a booking by hand.
    pub fn is_manual_initial(&self) -> bool {
        !matches!(self, BookingStatus::Maintenance | BookingStatus::Expired)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_whatsapp: String,
    pub booking_date: NaiveDate,
    pub slot: Slot,
    pub is_couple_promo: bool,
    pub total_price: i64,
    pub status: BookingStatus,
    pub expires_at: Option<NaiveDateTime>,
    pub admin_notes: Option<String>,
    pub deleted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// The occupancy predicate. Every read path that decides whether a slot
    /// is taken goes through here.
    pub fn occupies(&self, now: NaiveDateTime) -> bool {
        if self.deleted_at.is_some() {
            return false;
        }
        match self.status {
            BookingStatus::PendingPayment => self.expires_at.is_some_and(|exp| exp > now),
            status => BookingStatus::ALWAYS_OCCUPYING.contains(&status),
        }
    }

    pub fn hold_lapsed(&self, now: NaiveDateTime) -> bool {
        self.status == BookingStatus::PendingPayment
            && self.expires_at.map_or(true, |exp| exp <= now)
    }

    /// Status as a reader should see it: a lapsed hold reads as expired even
    /// before the sweep writes it back.
    pub fn effective_status(&self, now: NaiveDateTime) -> BookingStatus {
        if self.hold_lapsed(now) {
            BookingStatus::Expired
        } else {
            self.status
        }
    }

    /// RESERVED means the 50% deposit is in; CONFIRMED and COMPLETED are paid in full.
    pub fn amount_paid(&self) -> i64 {
        match self.status {
            BookingStatus::Reserved => deposit_for(self.total_price),
            BookingStatus::Confirmed | BookingStatus::Completed => self.total_price,
            _ => 0,
        }
    }

    pub fn balance_due(&self) -> i64 {
        match self.status {
            BookingStatus::PendingPayment | BookingStatus::Reserved | BookingStatus::Confirmed => {
                self.total_price - self.amount_paid()
            }
            _ => 0,
        }
    }
}

/// Deposit required to move a hold to RESERVED, rounded up.
pub fn deposit_for(total_price: i64) -> i64 {
    (total_price + 1) / 2
}
