pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod models;
pub mod observability;
pub mod simulation;
pub mod state;

pub use config::{Config, DispatchConfig};
pub use dispatch::Dispatch;
pub use engine::handle::BookingHandle;
pub use error::{BookingRejected, DispatchError};
pub use models::booking::{BookingEvent, BookingResult, BookingState};
pub use models::driver::Driver;
pub use models::passenger::Passenger;
