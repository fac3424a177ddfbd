use crate::accumulator::{NoiseGate, WindowParams};
use crate::current_meter::CurrentMeter;
use crate::error::{MeterError, Result};
use crate::metrics::{MetricsParams, VOLT_CALIBRATION_FACTOR};
use crate::sample_source::SineSource;
use crate::sensitivity::{TABLE_A, TABLE_B, TABLE_C};
use crate::smoothing::SmoothingPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// The meter builds this crate supports. They share the pipeline but were
/// tuned separately, so each keeps its own gate and curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeterVariant {
    /// Two channels, 3 mV gate, curve B for the final current, posts JSON.
    #[default]
    Telemetry,
    /// Two channels, 5 mV gate, curve A throughout, console only.
    /// The shipped standalone firmware used curve B for the final current.
    Standalone,
    /// Current channel only, offset re-measured every cycle, curve C.
    CurrentOnly,
}

impl FromStr for MeterVariant {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telemetry" => Ok(MeterVariant::Telemetry),
            "standalone" => Ok(MeterVariant::Standalone),
            "current" | "current_only" => Ok(MeterVariant::CurrentOnly),
            other => Err(MeterError::InvalidConfig(format!(
                "Unknown meter variant `{other}`"
            ))),
        }
    }
}

/// Parameters of the simulated sensor front end used when no ADC is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub bias_mv: f64,
    pub voltage_amplitude_mv: f64,
    pub current_amplitude_mv: f64,
    pub current_lag_deg: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bias_mv: 1650.0,
            voltage_amplitude_mv: 300.0,
            current_amplitude_mv: 150.0,
            current_lag_deg: 0.0,
        }
    }
}

impl SimulationConfig {
    pub fn build_source(&self) -> SineSource {
        SineSource::new(self.bias_mv)
            .with_voltage(self.voltage_amplitude_mv)
            .with_current(self.current_amplitude_mv, self.current_lag_deg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterConfig {
    pub variant: MeterVariant,
    /// Pairs averaged by the startup calibration of the two-channel meters.
    pub calibration_samples: usize,
    pub window: WindowParams,
    pub metrics: MetricsParams,
    pub current: CurrentMeter,
    /// Raw reads averaged into one sample by the current-only meter.
    pub oversample_reads: u32,
    pub smoothing: SmoothingPolicy,
    pub telemetry_url: String,
    pub telemetry_timeout: Duration,
    pub cycle_delay: Duration,
    pub console: bool,
    pub simulation: SimulationConfig,
}

impl MeterConfig {
    pub fn for_variant(variant: MeterVariant) -> Self {
        let (gate_mv, final_table) = match variant {
            MeterVariant::Telemetry => (3.0, TABLE_B),
            MeterVariant::Standalone => (5.0, TABLE_A),
            MeterVariant::CurrentOnly => (0.0, TABLE_C),
        };

        Self {
            variant,
            calibration_samples: 2000,
            window: WindowParams {
                samples: 2000,
                sample_delay_us: 100,
                gate: NoiseGate::uniform(gate_mv),
                volt_factor: VOLT_CALIBRATION_FACTOR,
                sample_table: TABLE_A,
            },
            metrics: MetricsParams {
                volt_factor: VOLT_CALIBRATION_FACTOR,
                final_table,
            },
            current: CurrentMeter {
                calibration_samples: 100,
                samples: 100,
                sample_delay_us: 0,
                table: TABLE_C,
            },
            oversample_reads: 10,
            smoothing: SmoothingPolicy::Passthrough,
            telemetry_url: String::new(),
            telemetry_timeout: Duration::from_millis(5000),
            cycle_delay: Duration::from_millis(1000),
            console: true,
            simulation: SimulationConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from a key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let variant = match lookup("METER_VARIANT") {
            Some(v) if !v.trim().is_empty() => v.parse()?,
            _ => MeterVariant::default(),
        };
        let mut config = Self::for_variant(variant);

        config.telemetry_url = lookup("TELEMETRY_URL").unwrap_or_default();
        config.console = parse_bool_or(lookup("METER_CONSOLE"), true);

        if let Some(weight) = lookup("METER_EMA_WEIGHT").filter(|w| !w.trim().is_empty()) {
            let weight = parse_f64("METER_EMA_WEIGHT", &weight)?;
            config.smoothing = SmoothingPolicy::exponential(weight)?;
        }

        let sim = &mut config.simulation;
        if let Some(v) = lookup("SIM_VOLTAGE_MV") {
            sim.voltage_amplitude_mv = parse_f64("SIM_VOLTAGE_MV", &v)?;
        }
        if let Some(v) = lookup("SIM_CURRENT_MV") {
            sim.current_amplitude_mv = parse_f64("SIM_CURRENT_MV", &v)?;
        }
        if let Some(v) = lookup("SIM_PHASE_DEG") {
            sim.current_lag_deg = parse_f64("SIM_PHASE_DEG", &v)?;
        }

        Ok(config)
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.variant == MeterVariant::Telemetry && !self.telemetry_url.is_empty()
    }

    pub fn log_summary(&self) {
        info!("Meter config:");
        info!("  Variant: {:?}", self.variant);
        match self.variant {
            MeterVariant::CurrentOnly => {
                info!(
                    "  Samples: {} offset + {} per cycle, {} reads averaged, curve {}",
                    self.current.calibration_samples,
                    self.current.samples,
                    self.oversample_reads,
                    self.current.table.name
                );
            }
            _ => {
                info!(
                    "  Samples: {} calibration, {} per window at {}us",
                    self.calibration_samples, self.window.samples, self.window.sample_delay_us
                );
                info!(
                    "  Noise gate: {} mV voltage, {} mV current",
                    self.window.gate.voltage_mv, self.window.gate.current_mv
                );
                info!(
                    "  Sensitivity curves: {} per sample, {} per window",
                    self.window.sample_table.name, self.metrics.final_table.name
                );
            }
        }
        info!("  Smoothing: {:?}", self.smoothing);
        info!(
            "  Telemetry: {}",
            if self.telemetry_enabled() {
                self.telemetry_url.as_str()
            } else {
                "none"
            }
        );
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|e| MeterError::InvalidConfig(format!("{key}=`{value}`: {e}")))
}

/// Parses a boolean from an optional string, falling back to `default` when
/// the value is missing or unrecognised.
fn parse_bool_or(val: Option<String>, default: bool) -> bool {
    val.and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
        .unwrap_or(default)
}
