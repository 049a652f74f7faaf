use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::dispatch::Dispatch;
use crate::engine::handle::BookingHandle;
use crate::error::DispatchError;
use crate::models::driver::Driver;
use crate::models::names::NameGenerator;
use crate::models::passenger::Passenger;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub dispatch: DispatchConfig,
    pub drivers: usize,
    pub passengers: usize,
    pub max_delay: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub drivers_added: usize,
    pub booked: usize,
    pub rejected: usize,
    pub completed: usize,
    pub failed: usize,
    pub idle_drivers: usize,
    pub elapsed: Duration,
    #[serde(skip)]
    pub metrics: String,
}

pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationReport, DispatchError> {
    let start = Instant::now();
    let dispatch = Arc::new(Dispatch::new(config.dispatch.clone())?);
    let region_names = dispatch.region_names();
    let names = NameGenerator::new();

    let mut drivers_added = 0;
    for _ in 0..config.drivers {
        if dispatch.add_driver(Driver::new(names.next_name("D"), config.max_delay)) {
            drivers_added += 1;
        }
    }

    let mut pending: Vec<BookingHandle> = Vec::with_capacity(config.passengers);
    let mut rejected = 0;
    for _ in 0..config.passengers {
        let passenger = Passenger::new(names.next_name("P"), config.max_delay);
        let Some(region) = region_names.choose(&mut rand::thread_rng()) else {
            rejected += 1;
            continue;
        };
        match dispatch.book_passenger(passenger, region) {
            Ok(handle) => pending.push(handle),
            Err(_) => rejected += 1,
        }
    }
    let booked = pending.len();
    info!(drivers = drivers_added, booked, rejected, "passengers booked");

    let closer = tokio::spawn({
        let dispatch = Arc::clone(&dispatch);
        async move { dispatch.shutdown().await }
    });
    dispatch.close();

    if let Some(region) = region_names.first() {
        let late = Passenger::new("Test", config.max_delay);
        if dispatch.book_passenger(late, region).is_ok() {
            return Err(DispatchError::Internal(
                "dispatch accepted a booking after shutdown began".to_string(),
            ));
        }
    }

    let mut completed = 0;
    let mut failed = 0;
    while !pending.is_empty() {
        let mut still_pending = Vec::with_capacity(pending.len());
        for mut handle in pending.drain(..) {
            if !handle.is_finished() {
                still_pending.push(handle);
                continue;
            }
            match handle.wait().await {
                Ok(result) => {
                    completed += 1;
                    info!(
                        job_id = result.job_id,
                        region = %result.region,
                        passenger = %result.passenger.name,
                        driver = %result.driver.name,
                        trip_ms = result.trip_duration.as_millis() as u64,
                        "trip completed"
                    );
                }
                Err(err) => {
                    failed += 1;
                    warn!(error = %err, "booking failed");
                }
            }
        }
        pending = still_pending;

        if !pending.is_empty() {
            info!(
                active = pending.len(),
                awaiting_driver = dispatch.bookings_awaiting_driver(),
                "bookings still in progress"
            );
            sleep(config.poll_interval).await;
        }
    }

    closer
        .await
        .map_err(|err| DispatchError::Internal(format!("shutdown task failed: {err}")))?;

    let metrics = dispatch.metrics().encode().map_err(DispatchError::Internal)?;

    Ok(SimulationReport {
        drivers_added,
        booked,
        rejected,
        completed,
        failed,
        idle_drivers: dispatch.idle_drivers(),
        elapsed: start.elapsed(),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{SimulationConfig, run_simulation};
    use crate::config::DispatchConfig;

    #[tokio::test]
    async fn small_simulation_completes_every_booking() {
        let config = SimulationConfig {
            dispatch: DispatchConfig::new([("North", 2), ("South", 1)]),
            drivers: 3,
            passengers: 8,
            max_delay: Duration::from_millis(5),
            poll_interval: Duration::from_millis(5),
        };

        let report = run_simulation(config).await.unwrap();
        assert_eq!(report.drivers_added, 3);
        assert_eq!(report.booked, 8);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.completed, 8);
        assert_eq!(report.failed, 0);
        assert_eq!(report.idle_drivers, 3);
        assert!(report.metrics.contains("bookings_total"));
    }
}
