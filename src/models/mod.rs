pub mod availability;
pub mod booking;
pub mod contact;
pub mod event;
pub mod pricing;

pub use availability::{CalendarDay, DayAvailability, UnavailableSlot};
pub use booking::{Booking, BookingStatus, Slot};
pub use contact::{FieldError, GuestContact};
pub use event::{BookingEvent, BookingEventKind};
pub use pricing::{DayClass, PricingConfig, PricingTable};
