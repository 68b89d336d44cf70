//! Collaborators the booking saga calls out to.

pub mod booking;

pub use booking::{BookingService, InMemoryBookingService};
