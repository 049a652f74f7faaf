use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::DispatchError;
use crate::simulation::SimulationConfig;

pub const DEFAULT_MAX_IDLE_DRIVERS: usize = 999;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub regions: BTreeMap<String, usize>,
    pub drivers: usize,
    pub passengers: usize,
    pub max_delay_ms: u64,
    pub log_events: bool,
    pub max_idle_drivers: usize,
    pub shutdown_grace_secs: u64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, DispatchError> {
        let _ = dotenvy::dotenv();

        let regions = match env::var("REGIONS") {
            Ok(raw) => parse_regions(&raw)?,
            Err(_) => parse_regions("North:10,South:5,East:8,West:4")?,
        };

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            regions,
            drivers: parse_or_default("DRIVERS", 10)?,
            passengers: parse_or_default("PASSENGERS", 30)?,
            max_delay_ms: parse_or_default("MAX_DELAY_MS", 100)?,
            log_events: parse_or_default("LOG_EVENTS", false)?,
            max_idle_drivers: parse_or_default("MAX_IDLE_DRIVERS", DEFAULT_MAX_IDLE_DRIVERS)?,
            shutdown_grace_secs: parse_or_default(
                "SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE.as_secs(),
            )?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE)?,
        })
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            regions: self.regions.clone(),
            log_events: self.log_events,
            max_idle_drivers: self.max_idle_drivers,
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            event_buffer_size: self.event_buffer_size,
        }
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            dispatch: self.dispatch_config(),
            drivers: self.drivers,
            passengers: self.passengers,
            max_delay: Duration::from_millis(self.max_delay_ms),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub regions: BTreeMap<String, usize>,
    pub log_events: bool,
    pub max_idle_drivers: usize,
    pub shutdown_grace: Duration,
    pub event_buffer_size: usize,
}

impl DispatchConfig {
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self {
            regions: regions
                .into_iter()
                .map(|(name, capacity)| (name.into(), capacity))
                .collect(),
            log_events: false,
            max_idle_drivers: DEFAULT_MAX_IDLE_DRIVERS,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }

    pub fn with_logging(mut self, log_events: bool) -> Self {
        self.log_events = log_events;
        self
    }

    pub fn with_max_idle_drivers(mut self, max_idle_drivers: usize) -> Self {
        self.max_idle_drivers = max_idle_drivers;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        for (name, capacity) in &self.regions {
            if name.trim().is_empty() {
                return Err(DispatchError::Config(
                    "region name must not be empty".to_string(),
                ));
            }
            if *capacity == 0 {
                return Err(DispatchError::Config(format!(
                    "region {name} must have a positive capacity"
                )));
            }
            if *capacity > Semaphore::MAX_PERMITS {
                return Err(DispatchError::Config(format!(
                    "region {name} capacity exceeds {}",
                    Semaphore::MAX_PERMITS
                )));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(DispatchError::Config(
                "event buffer size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parses `Name:capacity` pairs separated by commas, e.g. `North:3,South:2`.
pub fn parse_regions(raw: &str) -> Result<BTreeMap<String, usize>, DispatchError> {
    let mut regions = BTreeMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, capacity) = entry
            .split_once(':')
            .ok_or_else(|| DispatchError::Config(format!("invalid region entry {entry:?}")))?;
        let name = name.trim();
        let capacity = capacity.trim().parse::<usize>().map_err(|err| {
            DispatchError::Config(format!("invalid capacity for region {name}: {err}"))
        })?;

        if regions.insert(name.to_string(), capacity).is_some() {
            return Err(DispatchError::Config(format!("duplicate region {name}")));
        }
    }

    Ok(regions)
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, DispatchError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| DispatchError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::{DispatchConfig, parse_regions};
    use crate::error::DispatchError;

    #[test]
    fn parses_region_list() {
        let regions = parse_regions("North:3, South:2,").unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions["North"], 3);
        assert_eq!(regions["South"], 2);
    }

    #[test]
    fn rejects_duplicate_and_malformed_regions() {
        assert!(matches!(
            parse_regions("North:3,North:4"),
            Err(DispatchError::Config(_))
        ));
        assert!(matches!(parse_regions("North"), Err(DispatchError::Config(_))));
        assert!(matches!(
            parse_regions("North:many"),
            Err(DispatchError::Config(_))
        ));
    }

    #[test]
    fn zero_capacity_fails_validation() {
        let config = DispatchConfig::new([("Zone1", 0)]);
        assert!(matches!(config.validate(), Err(DispatchError::Config(_))));
    }

    #[test]
    fn capacity_above_permit_limit_fails_validation() {
        let config = DispatchConfig::new([("Zone1", usize::MAX)]);
        assert!(matches!(config.validate(), Err(DispatchError::Config(_))));

        let config = DispatchConfig::new([("Zone1", Semaphore::MAX_PERMITS)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = DispatchConfig::new([("Zone1", 2)])
            .with_logging(true)
            .with_max_idle_drivers(5)
            .with_shutdown_grace(Duration::from_secs(3));

        assert!(config.validate().is_ok());
        assert!(config.log_events);
        assert_eq!(config.max_idle_drivers, 5);
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.regions["Zone1"], 2);
    }
}
