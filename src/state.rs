use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::engine::driver_pool::DriverPool;
use crate::models::booking::BookingEvent;
use crate::observability::metrics::Metrics;

pub struct DispatchState {
    pub drivers: Arc<DriverPool>,
    pub metrics: Metrics,
    pub log_events: bool,
    pub booking_events_tx: broadcast::Sender<BookingEvent>,
    next_job_id: AtomicU64,
    awaiting_driver: AtomicUsize,
    submitted: AtomicU64,
}

impl DispatchState {
    pub fn new(max_idle_drivers: usize, log_events: bool, event_buffer_size: usize) -> Self {
        let metrics = Metrics::new();
        let (booking_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            drivers: Arc::new(DriverPool::new(
                max_idle_drivers,
                metrics.idle_drivers.clone(),
            )),
            metrics,
            log_events,
            booking_events_tx,
            next_job_id: AtomicU64::new(0),
            awaiting_driver: AtomicUsize::new(0),
            submitted: AtomicU64::new(0),
        }
    }

    /// Job ids start at 1 and follow completion order.
    pub fn next_job_id(&self) -> u64 {
        self.next_job_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn bookings_awaiting_driver(&self) -> usize {
        self.awaiting_driver.load(Ordering::SeqCst)
    }

    pub fn bookings_submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn log_event(&self, booking_id: Option<Uuid>, region: &str, message: impl Into<String>) {
        if !self.log_events {
            return;
        }

        let event = BookingEvent {
            booking_id,
            region: region.to_string(),
            message: message.into(),
            at: Utc::now(),
        };

        match event.booking_id {
            Some(id) => info!(booking_id = %id, region = %event.region, "{}", event.message),
            None => info!(region = %event.region, "{}", event.message),
        }
        let _ = self.booking_events_tx.send(event);
    }
}

pub(crate) struct AwaitingDriver {
    state: Arc<DispatchState>,
}

impl AwaitingDriver {
    pub(crate) fn register(state: &Arc<DispatchState>) -> Self {
        let now = state.awaiting_driver.fetch_add(1, Ordering::SeqCst) + 1;
        state.metrics.bookings_awaiting_driver.set(now as i64);

        Self {
            state: Arc::clone(state),
        }
    }
}

impl Drop for AwaitingDriver {
    fn drop(&mut self) {
        let now = self.state.awaiting_driver.fetch_sub(1, Ordering::SeqCst) - 1;
        self.state.metrics.bookings_awaiting_driver.set(now as i64);
    }
}
