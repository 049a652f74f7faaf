use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_total: IntCounterVec,
    pub bookings_awaiting_driver: IntGauge,
    pub idle_drivers: IntGauge,
    pub region_active_bookings: IntGaugeVec,
    pub trip_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_total = IntCounterVec::new(
            Opts::new("bookings_total", "Total bookings by outcome"),
            &["outcome"],
        )
        .expect("valid bookings_total metric");

        let bookings_awaiting_driver = IntGauge::new(
            "bookings_awaiting_driver",
            "Bookings admitted but not yet matched with a driver",
        )
        .expect("valid bookings_awaiting_driver metric");

        let idle_drivers = IntGauge::new("idle_drivers", "Drivers currently idle in the pool")
            .expect("valid idle_drivers metric");

        let region_active_bookings = IntGaugeVec::new(
            Opts::new(
                "region_active_bookings",
                "Bookings currently executing per region",
            ),
            &["region"],
        )
        .expect("valid region_active_bookings metric");

        let trip_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "trip_duration_seconds",
                "Time from booking creation to trip completion in seconds",
            ),
            &["outcome"],
        )
        .expect("valid trip_duration_seconds metric");

        registry
            .register(Box::new(bookings_total.clone()))
            .expect("register bookings_total");
        registry
            .register(Box::new(bookings_awaiting_driver.clone()))
            .expect("register bookings_awaiting_driver");
        registry
            .register(Box::new(idle_drivers.clone()))
            .expect("register idle_drivers");
        registry
            .register(Box::new(region_active_bookings.clone()))
            .expect("register region_active_bookings");
        registry
            .register(Box::new(trip_duration_seconds.clone()))
            .expect("register trip_duration_seconds");

        Self {
            registry,
            bookings_total,
            bookings_awaiting_driver,
            idle_drivers,
            region_active_bookings,
            trip_duration_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
