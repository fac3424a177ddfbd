use crate::accumulator::{accumulate_window, AccumulatedSums};
use crate::calibration::{calibrate_offsets, CalibrationOffsets};
use crate::config::{MeterConfig, MeterVariant};
use crate::current_meter::CurrentReading;
use crate::error::Result;
use crate::metrics::{compute_metrics, MeasurementResult};
use crate::report::{current_status_line, status_line};
use crate::sample_source::{Clock, OversampledSource, SampleSource};
use crate::smoothing::Smoother;
use crate::telemetry::TelemetryClient;
use anyhow::Context;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Output of one measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Power(MeasurementResult),
    Current(CurrentReading),
}

impl Measurement {
    pub fn status_line(&self) -> String {
        match self {
            Measurement::Power(result) => status_line(result),
            Measurement::Current(reading) => current_status_line(reading),
        }
    }
}

/// All state that survives between cycles: the source, the offsets measured
/// at startup and the smoothing filter.
pub struct PowerMeter<S, C> {
    source: S,
    clock: C,
    config: MeterConfig,
    offsets: Option<CalibrationOffsets>,
    smoother: Smoother,
}

impl<S: SampleSource, C: Clock> PowerMeter<S, C> {
    pub fn new(source: S, clock: C, config: MeterConfig) -> Self {
        let smoother = Smoother::new(config.smoothing);
        Self {
            source,
            clock,
            config,
            offsets: None,
            smoother,
        }
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn offsets(&self) -> Option<CalibrationOffsets> {
        self.offsets
    }

    /// Measures and stores the channel offsets. Runs once; the offsets are
    /// never refreshed afterwards.
    pub fn calibrate(&mut self) -> Result<CalibrationOffsets> {
        let offsets = calibrate_offsets(
            &mut self.source,
            &mut self.clock,
            self.config.calibration_samples,
            self.config.window.sample_delay_us,
        )?;
        self.offsets = Some(offsets);
        Ok(offsets)
    }

    /// Runs one sample window and derives its metrics. Two-channel meters
    /// calibrate first if that has not happened yet.
    pub fn measure(&mut self) -> Result<Measurement> {
        match self.config.variant {
            MeterVariant::CurrentOnly => self.measure_current().map(Measurement::Current),
            MeterVariant::Telemetry | MeterVariant::Standalone => {
                self.measure_power().map(Measurement::Power)
            }
        }
    }

    fn measure_power(&mut self) -> Result<MeasurementResult> {
        let offsets = match self.offsets {
            Some(offsets) => offsets,
            None => self.calibrate()?,
        };
        let sums = self.accumulate(&offsets)?;
        let raw = compute_metrics(&sums, &self.config.metrics)?;
        debug!(
            "Window sums: v_sq {:.1}, i_sq {:.1}, p {:.3}, flow {:?}",
            sums.sum_v_sq,
            sums.sum_i_sq,
            sums.sum_p,
            raw.power_flow()
        );
        Ok(self.smoother.apply(raw))
    }

    fn accumulate(&mut self, offsets: &CalibrationOffsets) -> Result<AccumulatedSums> {
        accumulate_window(
            &mut self.source,
            &mut self.clock,
            offsets,
            &self.config.window,
        )
    }

    fn measure_current(&mut self) -> Result<CurrentReading> {
        let mut source = OversampledSource::new(&mut self.source, self.config.oversample_reads);
        self.config.current.measure(&mut source, &mut self.clock)
    }
}

/// Drives calibrate-once, then measure, report and sleep forever.
///
/// Sampling blocks on microsecond delays, so each window runs on the blocking
/// pool with the meter moved in and handed back afterwards. Only this loop
/// ever touches the meter state.
pub struct MeterLoop<S, C> {
    meter: Option<PowerMeter<S, C>>,
    telemetry: Option<TelemetryClient>,
    console: bool,
    cycle_delay: Duration,
}

impl<S, C> MeterLoop<S, C>
where
    S: SampleSource + Send + 'static,
    C: Clock + Send + 'static,
{
    pub fn new(meter: PowerMeter<S, C>, telemetry: Option<TelemetryClient>) -> Self {
        let console = meter.config().console;
        let cycle_delay = meter.config().cycle_delay;
        Self {
            meter: Some(meter),
            telemetry,
            console,
            cycle_delay,
        }
    }

    /// Builds the telemetry client from the config when the variant posts
    /// data and an endpoint is set.
    pub fn from_config(meter: PowerMeter<S, C>) -> anyhow::Result<Self> {
        let config = meter.config();
        let telemetry = if config.telemetry_enabled() {
            Some(TelemetryClient::new(
                config.telemetry_url.clone(),
                config.telemetry_timeout,
            )?)
        } else {
            None
        };
        Ok(Self::new(meter, telemetry))
    }

    /// Runs until the sample source fails.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.calibrate().await?;
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Measurement stopped: {e:#}");
                return Err(e);
            }
            tokio::time::sleep(self.cycle_delay).await;
        }
    }

    /// Calibrates the two-channel meters. The current-only meter measures its
    /// offset inside every cycle instead.
    pub async fn calibrate(&mut self) -> anyhow::Result<Option<CalibrationOffsets>> {
        let needs_offsets = self
            .meter
            .as_ref()
            .is_some_and(|m| m.config().variant != MeterVariant::CurrentOnly);
        if !needs_offsets {
            return Ok(None);
        }
        let offsets = self
            .with_meter(|meter| meter.calibrate())
            .await
            .context("Calibration failed")?;
        Ok(Some(offsets))
    }

    /// One measure-and-report pass, without the trailing delay.
    pub async fn run_cycle(&mut self) -> anyhow::Result<Measurement> {
        let measurement = self
            .with_meter(|meter| meter.measure())
            .await
            .context("Measurement failed")?;
        self.report(&measurement).await;
        Ok(measurement)
    }

    async fn report(&self, measurement: &Measurement) {
        if self.console {
            println!("{}", measurement.status_line());
        }

        let (Some(client), Measurement::Power(result)) = (&self.telemetry, measurement) else {
            return;
        };
        match client.post_measurement(result).await {
            Ok(()) => info!("Data sent successfully"),
            Err(e) => warn!("Error sending data: {e}"),
        }
    }

    async fn with_meter<T, F>(&mut self, work: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PowerMeter<S, C>) -> Result<T> + Send + 'static,
    {
        let mut meter = self
            .meter
            .take()
            .context("Meter state was lost in an earlier cycle")?;
        let (meter, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = work(&mut meter);
            (meter, outcome)
        })
        .await
        .context("Sampling task panicked")?;
        self.meter = Some(meter);
        Ok(outcome?)
    }
}
