use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::engine::handle::BookingHandle;
use crate::engine::region::Region;
use crate::error::{BookingRejected, DispatchError};
use crate::models::booking::BookingEvent;
use crate::models::driver::Driver;
use crate::models::passenger::Passenger;
use crate::observability::metrics::Metrics;
use crate::state::{AwaitingDriver, DispatchState};

pub struct Dispatch {
    state: Arc<DispatchState>,
    regions: DashMap<String, Arc<Region>>,
    closed: AtomicBool,
    shutdown_grace: Duration,
}

impl Dispatch {
    /// Spawns one admission loop per region; call from inside a tokio runtime.
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;

        let state = Arc::new(DispatchState::new(
            config.max_idle_drivers,
            config.log_events,
            config.event_buffer_size,
        ));

        let regions = DashMap::new();
        for (name, capacity) in &config.regions {
            regions.insert(
                name.clone(),
                Arc::new(Region::new(Arc::clone(&state), name.clone(), *capacity)),
            );
        }

        info!(
            regions = regions.len(),
            log_events = config.log_events,
            "dispatch started"
        );

        Ok(Self {
            state,
            regions,
            closed: AtomicBool::new(false),
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn add_driver(&self, driver: Driver) -> bool {
        let name = driver.name.clone();
        let added = self.state.drivers.add_driver(driver);
        if !added {
            warn!(
                driver = %name,
                max_idle = self.state.drivers.max_idle(),
                "driver pool full; driver not added"
            );
        }
        added
    }

    pub fn book_passenger(
        &self,
        passenger: Passenger,
        region: &str,
    ) -> Result<BookingHandle, BookingRejected> {
        if self.is_shutdown() {
            warn!(region = %region, passenger = %passenger.name, "booking rejected: dispatch is shutting down");
            return Err(BookingRejected::DispatchShutdown);
        }

        let Some(target) = self.region(region) else {
            warn!(region = %region, passenger = %passenger.name, "booking rejected: unknown region");
            return Err(BookingRejected::UnknownRegion(region.to_string()));
        };
        if target.is_shutdown() {
            warn!(region = %region, passenger = %passenger.name, "booking rejected: region is shutting down");
            return Err(BookingRejected::RegionShutdown(region.to_string()));
        }

        let awaiting = AwaitingDriver::register(&self.state);
        target.enqueue(passenger, awaiting)
    }

    pub fn bookings_awaiting_driver(&self) -> usize {
        self.state.bookings_awaiting_driver()
    }

    pub fn bookings_submitted(&self) -> u64 {
        self.state.bookings_submitted()
    }

    pub fn log_event(&self, booking_id: Option<Uuid>, region: &str, message: impl Into<String>) {
        self.state.log_event(booking_id, region, message);
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("dispatch closed to new bookings");
        }
    }

    pub async fn shutdown(&self) {
        self.close();

        let regions: Vec<Arc<Region>> = self
            .regions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        join_all(regions.iter().map(|region| region.shutdown(self.shutdown_grace))).await;

        info!(
            idle_drivers = self.idle_drivers(),
            awaiting_driver = self.bookings_awaiting_driver(),
            "dispatch shut down"
        );
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn idle_drivers(&self) -> usize {
        self.state.drivers.idle_count()
    }

    pub fn region(&self, name: &str) -> Option<Arc<Region>> {
        self.regions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.regions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Booking events published while logging is enabled. Lagged receivers skip
    /// the events they missed.
    pub fn subscribe_events(&self) -> impl Stream<Item = BookingEvent> + use<> {
        BroadcastStream::new(self.state.booking_events_tx.subscribe())
            .filter_map(|event| event.ok())
    }

    pub fn metrics(&self) -> &Metrics {
        &self.state.metrics
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Dispatch;
    use crate::config::DispatchConfig;
    use crate::error::{BookingRejected, DispatchError};
    use crate::models::driver::Driver;
    use crate::models::passenger::Passenger;

    #[tokio::test]
    async fn unknown_region_is_rejected_without_side_effects() {
        let dispatch = Dispatch::new(DispatchConfig::new([("A", 1)])).unwrap();

        let rejected = dispatch
            .book_passenger(Passenger::new("P-Ann", Duration::ZERO), "DoesNotExist")
            .unwrap_err();

        assert_eq!(
            rejected,
            BookingRejected::UnknownRegion("DoesNotExist".to_string())
        );
        assert_eq!(dispatch.bookings_awaiting_driver(), 0);
        assert_eq!(dispatch.bookings_submitted(), 0);
        let region = dispatch.region("A").unwrap();
        assert_eq!(region.pending_bookings(), 0);
        assert_eq!(region.active_bookings(), 0);
    }

    #[tokio::test]
    async fn add_driver_reports_overflow() {
        let dispatch = Dispatch::new(
            DispatchConfig::new([("A", 1)]).with_max_idle_drivers(1),
        )
        .unwrap();

        assert!(dispatch.add_driver(Driver::new("D-Amy", Duration::ZERO)));
        assert!(!dispatch.add_driver(Driver::new("D-Ben", Duration::ZERO)));
        assert_eq!(dispatch.idle_drivers(), 1);
    }

    #[tokio::test]
    async fn close_rejects_every_region() {
        let dispatch = Dispatch::new(DispatchConfig::new([("A", 1), ("B", 2)])).unwrap();
        dispatch.close();

        for region in ["A", "B", "Nowhere"] {
            assert_eq!(
                dispatch
                    .book_passenger(Passenger::new("P-Late", Duration::ZERO), region)
                    .unwrap_err(),
                BookingRejected::DispatchShutdown
            );
        }
        dispatch.shutdown().await;
    }

    #[tokio::test]
    async fn oversized_region_is_refused_at_construction() {
        let result = Dispatch::new(DispatchConfig::new([("Huge", usize::MAX)]));
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[tokio::test]
    async fn region_names_are_sorted() {
        let dispatch = Dispatch::new(DispatchConfig::new([("South", 1), ("North", 1)])).unwrap();
        assert_eq!(dispatch.region_names(), vec!["North", "South"]);
    }
}
