use ride_dispatch::config::Config;
use ride_dispatch::error::DispatchError;
use ride_dispatch::simulation::run_simulation;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), DispatchError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    info!(
        regions = ?config.regions,
        drivers = config.drivers,
        passengers = config.passengers,
        max_delay_ms = config.max_delay_ms,
        "simulation starting"
    );

    let report = run_simulation(config.simulation_config()).await?;

    let summary = serde_json::to_string(&report)
        .map_err(|err| DispatchError::Internal(format!("failed to serialize report: {err}")))?;
    info!(report = %summary, "simulation complete");
    debug!("{}", report.metrics);

    Ok(())
}
