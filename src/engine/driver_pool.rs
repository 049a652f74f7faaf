use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::IntGauge;
use tokio::sync::Semaphore;

use crate::error::DispatchError;
use crate::models::driver::Driver;

pub struct DriverPool {
    idle: Mutex<VecDeque<Driver>>,
    available: Semaphore,
    max_idle: usize,
    idle_gauge: IntGauge,
}

impl DriverPool {
    pub fn new(max_idle: usize, idle_gauge: IntGauge) -> Self {
        Self {
            idle: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
            max_idle,
            idle_gauge,
        }
    }

    pub fn add_driver(&self, driver: Driver) -> bool {
        {
            let mut idle = self.idle.lock();
            if idle.len() >= self.max_idle {
                return false;
            }
            idle.push_back(driver);
            self.idle_gauge.set(idle.len() as i64);
        }
        self.available.add_permits(1);
        true
    }

    /// Waits for an idle driver. Dropping the returned future stops waiting
    /// without taking one.
    pub async fn acquire(self: &Arc<Self>) -> Result<DriverLease, DispatchError> {
        let permit = self
            .available
            .acquire()
            .await
            .map_err(|err| DispatchError::Cancelled(format!("driver pool closed: {err}")))?;
        permit.forget();

        let driver = {
            let mut idle = self.idle.lock();
            let driver = idle.pop_front();
            self.idle_gauge.set(idle.len() as i64);
            driver
        }
        .ok_or_else(|| DispatchError::Internal("idle driver permit without driver".to_string()))?;

        Ok(DriverLease {
            driver: Some(driver),
            pool: Arc::clone(self),
        })
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    fn release(&self, mut driver: Driver) {
        driver.drop_off();
        {
            let mut idle = self.idle.lock();
            idle.push_back(driver);
            self.idle_gauge.set(idle.len() as i64);
        }
        self.available.add_permits(1);
    }
}

/// A driver taken out of the pool. Dropping the lease puts the driver back,
/// including when the owning task is aborted.
pub struct DriverLease {
    driver: Option<Driver>,
    pool: Arc<DriverPool>,
}

impl Deref for DriverLease {
    type Target = Driver;

    fn deref(&self) -> &Driver {
        self.driver
            .as_ref()
            .expect("driver lease is populated until drop")
    }
}

impl DerefMut for DriverLease {
    fn deref_mut(&mut self) -> &mut Driver {
        self.driver
            .as_mut()
            .expect("driver lease is populated until drop")
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            self.pool.release(driver);
        }
    }
}
