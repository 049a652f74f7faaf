use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::passenger::Passenger;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingState {
    Created,
    AwaitingDriver,
    InTrip,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResult {
    pub job_id: u64,
    pub booking_id: Uuid,
    pub region: String,
    pub passenger: Passenger,
    pub driver: Driver,
    pub requested_at: DateTime<Utc>,
    pub trip_duration: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    /// `None` for region-level events such as a rejected submission.
    pub booking_id: Option<Uuid>,
    pub region: String,
    pub message: String,
    pub at: DateTime<Utc>,
}
