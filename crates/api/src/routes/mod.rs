pub mod bookings;
pub mod events;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod sagas;
