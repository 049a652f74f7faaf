use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::engine::booking::Booking;
use crate::engine::handle::{BookingHandle, BookingOutcome};
use crate::error::BookingRejected;
use crate::models::passenger::Passenger;
use crate::state::{AwaitingDriver, DispatchState};

struct QueuedBooking {
    booking: Booking,
    reply: oneshot::Sender<BookingOutcome>,
}

#[derive(Default)]
struct Occupancy {
    pending: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

pub struct Region {
    name: String,
    capacity: usize,
    ctx: Arc<DispatchState>,
    queue_tx: Mutex<Option<mpsc::UnboundedSender<QueuedBooking>>>,
    occupancy: Arc<Occupancy>,
    shutdown: AtomicBool,
    force_cancel: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Region {
    /// Spawns the region's admission loop, so this must run inside a tokio runtime.
    pub fn new(ctx: Arc<DispatchState>, name: impl Into<String>, capacity: usize) -> Self {
        let name = name.into();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let occupancy = Arc::new(Occupancy::default());
        let force_cancel = Arc::new(Notify::new());

        let worker = tokio::spawn(run_admission_loop(
            name.clone(),
            capacity,
            Arc::clone(&ctx),
            queue_rx,
            Arc::clone(&occupancy),
            Arc::clone(&force_cancel),
        ));

        Self {
            name,
            capacity,
            ctx,
            queue_tx: Mutex::new(Some(queue_tx)),
            occupancy,
            shutdown: AtomicBool::new(false),
            force_cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn submit(&self, passenger: Passenger) -> Result<BookingHandle, BookingRejected> {
        self.enqueue(passenger, AwaitingDriver::register(&self.ctx))
    }

    pub(crate) fn enqueue(
        &self,
        passenger: Passenger,
        awaiting: AwaitingDriver,
    ) -> Result<BookingHandle, BookingRejected> {
        let queue_tx = self.queue_tx.lock();
        let Some(tx) = queue_tx.as_ref().filter(|_| !self.is_shutdown()) else {
            return Err(self.reject());
        };

        let booking = Booking::new(Arc::clone(&self.ctx), &self.name, passenger, awaiting);
        let (reply, receiver) = oneshot::channel();
        let handle = BookingHandle::new(booking.id(), &self.name, receiver);

        self.occupancy.pending.fetch_add(1, Ordering::SeqCst);
        if tx.send(QueuedBooking { booking, reply }).is_err() {
            self.occupancy.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(self.reject());
        }
        self.ctx.record_submitted();

        debug!(region = %self.name, booking_id = %handle.booking_id(), "booking queued");
        Ok(handle)
    }

    pub async fn shutdown(&self, grace: Duration) {
        {
            let mut queue_tx = self.queue_tx.lock();
            self.shutdown.store(true, Ordering::SeqCst);
            queue_tx.take();
        }

        let worker = self.worker.lock().take();
        let Some(mut worker) = worker else {
            return;
        };

        info!(
            region = %self.name,
            pending = self.pending_bookings(),
            active = self.active_bookings(),
            "region shutting down"
        );

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(Ok(())) => info!(region = %self.name, "region drained"),
            Ok(Err(err)) => error!(region = %self.name, error = %err, "admission loop failed"),
            Err(_) => {
                warn!(
                    region = %self.name,
                    grace_ms = grace.as_millis() as u64,
                    "grace period elapsed; cancelling remaining bookings"
                );
                self.force_cancel.notify_one();
                if let Err(err) = worker.await {
                    error!(region = %self.name, error = %err, "admission loop failed");
                }
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_bookings(&self) -> usize {
        self.occupancy.active.load(Ordering::SeqCst)
    }

    pub fn peak_active_bookings(&self) -> usize {
        self.occupancy.peak.load(Ordering::SeqCst)
    }

    pub fn pending_bookings(&self) -> usize {
        self.occupancy.pending.load(Ordering::SeqCst)
    }

    fn reject(&self) -> BookingRejected {
        warn!(region = %self.name, "booking rejected: region is shutting down");
        self.ctx.log_event(
            None,
            &self.name,
            format!("booking rejected: region {} is shutting down", self.name),
        );
        BookingRejected::RegionShutdown(self.name.clone())
    }
}

struct ActiveSlot {
    region: String,
    occupancy: Arc<Occupancy>,
    ctx: Arc<DispatchState>,
    _permit: OwnedSemaphorePermit,
}

impl ActiveSlot {
    fn claim(
        region: &str,
        occupancy: &Arc<Occupancy>,
        ctx: &Arc<DispatchState>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        occupancy.pending.fetch_sub(1, Ordering::SeqCst);
        let active = occupancy.active.fetch_add(1, Ordering::SeqCst) + 1;
        occupancy.peak.fetch_max(active, Ordering::SeqCst);
        ctx.metrics
            .region_active_bookings
            .with_label_values(&[region])
            .set(active as i64);

        Self {
            region: region.to_string(),
            occupancy: Arc::clone(occupancy),
            ctx: Arc::clone(ctx),
            _permit: permit,
        }
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let active = self.occupancy.active.fetch_sub(1, Ordering::SeqCst) - 1;
        self.ctx
            .metrics
            .region_active_bookings
            .with_label_values(&[self.region.as_str()])
            .set(active as i64);
    }
}

async fn run_admission_loop(
    region: String,
    capacity: usize,
    ctx: Arc<DispatchState>,
    mut queue_rx: mpsc::UnboundedReceiver<QueuedBooking>,
    occupancy: Arc<Occupancy>,
    force_cancel: Arc<Notify>,
) {
    info!(region = %region, capacity, "admission loop started");

    let gate = Arc::new(Semaphore::new(capacity));
    let mut in_flight = JoinSet::new();
    let mut next: Option<QueuedBooking> = None;
    let mut queue_closed = false;

    loop {
        if queue_closed && next.is_none() && in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            _ = force_cancel.notified() => {
                let mut cancelled = in_flight.len();
                in_flight.abort_all();

                if next.take().is_some() {
                    occupancy.pending.fetch_sub(1, Ordering::SeqCst);
                    cancelled += 1;
                }
                queue_rx.close();
                while let Ok(queued) = queue_rx.try_recv() {
                    occupancy.pending.fetch_sub(1, Ordering::SeqCst);
                    cancelled += 1;
                    drop(queued);
                }

                // Aborted bookings hand their drivers back while unwinding.
                while in_flight.join_next().await.is_some() {}

                warn!(region = %region, cancelled, "unfinished bookings force-cancelled");
                break;
            }

            Some(joined) = in_flight.join_next() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        error!(region = %region, error = %err, "booking task panicked");
                    }
                }
            }

            permit = Arc::clone(&gate).acquire_owned(), if next.is_some() => {
                let Ok(permit) = permit else {
                    error!(region = %region, "admission gate closed");
                    break;
                };
                if let Some(QueuedBooking { booking, reply }) = next.take() {
                    let slot = ActiveSlot::claim(&region, &occupancy, &ctx, permit);
                    debug!(
                        region = %region,
                        booking_id = %booking.id(),
                        active = occupancy.active.load(Ordering::SeqCst),
                        "booking admitted"
                    );
                    in_flight.spawn(async move {
                        let outcome = booking.run().await;
                        drop(slot);
                        let _ = reply.send(outcome);
                    });
                }
            }

            received = queue_rx.recv(), if next.is_none() && !queue_closed => {
                match received {
                    Some(queued) => next = Some(queued),
                    None => queue_closed = true,
                }
            }
        }
    }

    info!(region = %region, "admission loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::Region;
    use crate::error::{BookingRejected, DispatchError};
    use crate::models::driver::Driver;
    use crate::models::passenger::Passenger;
    use crate::state::DispatchState;

    fn ctx_with_drivers(drivers: usize) -> Arc<DispatchState> {
        let ctx = Arc::new(DispatchState::new(64, false, 64));
        for i in 0..drivers {
            ctx.drivers
                .add_driver(Driver::new(format!("D-{i}"), Duration::from_millis(20)));
        }
        ctx
    }

    #[tokio::test]
    async fn active_bookings_never_exceed_capacity() {
        let ctx = ctx_with_drivers(6);
        let region = Region::new(Arc::clone(&ctx), "North", 2);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                region
                    .submit(Passenger::new(format!("P-{i}"), Duration::from_millis(20)))
                    .unwrap()
            })
            .collect();

        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert!(region.peak_active_bookings() <= 2);
        assert!(region.peak_active_bookings() >= 1);
        assert_eq!(region.active_bookings(), 0);
        assert_eq!(region.pending_bookings(), 0);
        assert_eq!(ctx.drivers.idle_count(), 6);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let ctx = ctx_with_drivers(1);
        let region = Region::new(Arc::clone(&ctx), "South", 1);

        region.shutdown(Duration::from_secs(1)).await;
        assert!(region.is_shutdown());

        let rejected = region
            .submit(Passenger::new("P-Late", Duration::ZERO))
            .unwrap_err();
        assert_eq!(rejected, BookingRejected::RegionShutdown("South".to_string()));
        assert_eq!(ctx.bookings_awaiting_driver(), 0);
        assert_eq!(ctx.bookings_submitted(), 0);
    }

    #[tokio::test]
    async fn shutdown_drains_queued_bookings() {
        let ctx = ctx_with_drivers(1);
        let region = Region::new(Arc::clone(&ctx), "East", 1);

        let handles: Vec<_> = (0..3)
            .map(|i| {
                region
                    .submit(Passenger::new(format!("P-{i}"), Duration::from_millis(10)))
                    .unwrap()
            })
            .collect();
        assert_eq!(ctx.bookings_submitted(), 3);

        region.shutdown(Duration::from_secs(5)).await;

        for mut handle in handles {
            assert!(handle.is_finished());
            handle.wait().await.unwrap();
        }
        assert_eq!(ctx.drivers.idle_count(), 1);
    }

    #[tokio::test]
    async fn grace_timeout_cancels_and_returns_drivers() {
        let ctx = Arc::new(DispatchState::new(8, false, 64));
        ctx.drivers
            .add_driver(Driver::new("D-Slow", Duration::from_secs(30)));
        let region = Region::new(Arc::clone(&ctx), "West", 1);

        let running = region
            .submit(Passenger::new("P-First", Duration::from_secs(30)))
            .unwrap();
        let queued = region
            .submit(Passenger::new("P-Second", Duration::from_secs(30)))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        region.shutdown(Duration::from_millis(50)).await;

        assert!(matches!(running.wait().await, Err(DispatchError::Cancelled(_))));
        assert!(matches!(queued.wait().await, Err(DispatchError::Cancelled(_))));
        assert_eq!(ctx.drivers.idle_count(), 1);
        assert_eq!(region.active_bookings(), 0);
        assert_eq!(region.pending_bookings(), 0);
        assert_eq!(ctx.bookings_awaiting_driver(), 0);
    }

    #[tokio::test]
    async fn admission_follows_submission_order() {
        let ctx = Arc::new(DispatchState::new(8, false, 64));
        ctx.drivers.add_driver(Driver::new("D-Solo", Duration::ZERO));
        let region = Region::new(Arc::clone(&ctx), "Central", 1);

        let handles: Vec<_> = (0..5)
            .map(|i| {
                region
                    .submit(Passenger::new(format!("P-{i}"), Duration::from_millis(2)))
                    .unwrap()
            })
            .collect();

        let mut job_ids = Vec::new();
        for handle in handles {
            job_ids.push(handle.wait().await.unwrap().job_id);
        }
        assert_eq!(job_ids, vec![1, 2, 3, 4, 5]);
    }
}
