use ac_power_meter::{MeterConfig, MeterLoop, PowerMeter, SpinClock};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting AC power meter");
    let config = MeterConfig::from_env().context("Invalid meter configuration")?;
    config.log_summary();

    // No ADC on this target: feed the pipeline from the simulated front end
    let source = config.simulation.build_source();
    let meter = PowerMeter::new(source, SpinClock, config);

    info!("Starting measurement task...");
    MeterLoop::from_config(meter)?.run().await
}
