use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    StatusChanged,
    Reassigned,
    NotesUpdated,
    Deleted,
    Restored,
    Purged,
    MaintenanceBlocked,
    MaintenanceUnblocked,
    HoldsExpired,
}

impl BookingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "created",
            BookingEventKind::StatusChanged => "status_changed",
            BookingEventKind::Reassigned => "reassigned",
            BookingEventKind::NotesUpdated => "notes_updated",
            BookingEventKind::Deleted => "deleted",
            BookingEventKind::Restored => "restored",
            BookingEventKind::Purged => "purged",
            BookingEventKind::MaintenanceBlocked => "maintenance_blocked",
            BookingEventKind::MaintenanceUnblocked => "maintenance_unblocked",
            BookingEventKind::HoldsExpired => "holds_expired",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingEvent {
    pub id: i64,
    pub booking_id: Option<String>,
    pub kind: String,
    pub detail: String,
    pub created_at: String,
}
