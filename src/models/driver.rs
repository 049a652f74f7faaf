use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::bounded_delay;
use crate::models::passenger::Passenger;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub max_delay: Duration,
    #[serde(skip)]
    current_passenger: Option<Passenger>,
}

impl Driver {
    pub fn new(name: impl Into<String>, max_delay: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            max_delay,
            current_passenger: None,
        }
    }

    pub fn pick_up_passenger(&mut self, passenger: Passenger) -> Duration {
        self.current_passenger = Some(passenger);
        bounded_delay(self.max_delay)
    }

    pub fn travel_time(&self) -> Result<Duration, DispatchError> {
        self.current_passenger
            .as_ref()
            .map(Passenger::travel_time)
            .ok_or_else(|| DispatchError::NoPassengerAssigned(self.name.clone()))
    }

    pub fn current_passenger(&self) -> Option<&Passenger> {
        self.current_passenger.as_ref()
    }

    pub fn drop_off(&mut self) -> Option<Passenger> {
        self.current_passenger.take()
    }
}
