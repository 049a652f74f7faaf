use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::booking::{BookingResult, BookingState};
use crate::models::passenger::Passenger;
use crate::state::{AwaitingDriver, DispatchState};

pub struct Booking {
    id: Uuid,
    region: String,
    passenger: Passenger,
    state: BookingState,
    created_at: DateTime<Utc>,
    started: Instant,
    awaiting: Option<AwaitingDriver>,
    ctx: Arc<DispatchState>,
}

impl Booking {
    pub(crate) fn new(
        ctx: Arc<DispatchState>,
        region: &str,
        passenger: Passenger,
        awaiting: AwaitingDriver,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            region: region.to_string(),
            passenger,
            state: BookingState::Created,
            created_at: Utc::now(),
            started: Instant::now(),
            awaiting: Some(awaiting),
            ctx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> BookingState {
        self.state
    }

    pub async fn run(mut self) -> Result<BookingResult, DispatchError> {
        let outcome = self.execute().await;

        let outcome_label = match &outcome {
            Ok(result) => {
                self.transition(
                    BookingState::Completed,
                    format!(
                        "completed as job {} in {} ms",
                        result.job_id,
                        result.trip_duration.as_millis()
                    ),
                );
                "completed"
            }
            Err(err) => {
                self.transition(BookingState::Failed, format!("failed: {err}"));
                "failed"
            }
        };

        self.ctx
            .metrics
            .bookings_total
            .with_label_values(&[outcome_label])
            .inc();
        self.ctx
            .metrics
            .trip_duration_seconds
            .with_label_values(&[outcome_label])
            .observe(self.started.elapsed().as_secs_f64());

        outcome
    }

    async fn execute(&mut self) -> Result<BookingResult, DispatchError> {
        self.transition(BookingState::AwaitingDriver, "waiting for a driver");
        let mut driver = self.ctx.drivers.acquire().await?;
        self.awaiting.take();

        self.transition(
            BookingState::InTrip,
            format!("driver {} assigned", driver.name),
        );

        let pickup = driver.pick_up_passenger(self.passenger.clone());
        self.log(format!(
            "{} picking up {} ({} ms)",
            driver.name,
            self.passenger.name,
            pickup.as_millis()
        ));
        sleep(pickup).await;

        let travel = driver.travel_time()?;
        self.log(format!(
            "{} driving {} to destination ({} ms)",
            driver.name,
            self.passenger.name,
            travel.as_millis()
        ));
        sleep(travel).await;

        let trip_duration = self.started.elapsed();
        let mut snapshot = (*driver).clone();
        snapshot.drop_off();
        drop(driver);

        Ok(BookingResult {
            job_id: self.ctx.next_job_id(),
            booking_id: self.id,
            region: self.region.clone(),
            passenger: self.passenger.clone(),
            driver: snapshot,
            requested_at: self.created_at,
            trip_duration,
        })
    }

    fn transition(&mut self, next: BookingState, message: impl Into<String>) {
        self.state = next;
        self.log(message);
    }

    fn log(&self, message: impl Into<String>) {
        self.ctx.log_event(Some(self.id), &self.region, message);
    }
}

impl Drop for Booking {
    fn drop(&mut self) {
        if matches!(self.state, BookingState::Completed | BookingState::Failed) {
            return;
        }

        self.state = BookingState::Failed;
        self.log("cancelled before completion");
        self.ctx
            .metrics
            .bookings_total
            .with_label_values(&["cancelled"])
            .inc();
    }
}
