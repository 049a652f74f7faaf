use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::bounded_delay;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passenger {
    pub id: Uuid,
    pub name: String,
    pub max_travel_time: Duration,
}

impl Passenger {
    pub fn new(name: impl Into<String>, max_travel_time: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            max_travel_time,
        }
    }

    /// Drawn fresh on every call; two calls for the same passenger usually differ.
    pub fn travel_time(&self) -> Duration {
        bounded_delay(self.max_travel_time)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Passenger;

    #[test]
    fn travel_time_stays_within_bound() {
        let passenger = Passenger::new("P-Olivia", Duration::from_millis(40));
        for _ in 0..100 {
            assert!(passenger.travel_time() <= Duration::from_millis(40));
        }
    }

    #[test]
    fn passengers_get_distinct_ids() {
        let a = Passenger::new("P-Jack", Duration::ZERO);
        let b = Passenger::new("P-Jack", Duration::ZERO);
        assert_ne!(a.id, b.id);
    }
}
