use crate::accumulator::AccumulatedSums;
use crate::error::{MeterError, Result};
use crate::sensitivity::SensitivityTable;

/// Grid volts per sensor volt of the voltage transformer stage.
pub const VOLT_CALIBRATION_FACTOR: f64 = 676.643;

/// Direction of the active power over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerFlow {
    Import,
    Export,
    Idle,
}

/// One reporting cycle's worth of derived quantities.
///
/// `active_power` is signed. Reports show its magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasurementResult {
    /// RMS voltage on the current channel, in volts.
    pub vrms_current: f64,
    /// RMS voltage on the voltage channel, in volts.
    pub vrms_sensor: f64,
    pub vrms_grid: f64,
    pub irms: f64,
    pub active_power: f64,
    pub apparent_power: f64,
    pub power_factor: f64,
}

impl MeasurementResult {
    /// Active power magnitude in watts, as reported.
    pub fn real_power(&self) -> f64 {
        self.active_power.abs()
    }

    pub fn power_flow(&self) -> PowerFlow {
        if self.active_power > 0.0 {
            PowerFlow::Import
        } else if self.active_power < 0.0 {
            PowerFlow::Export
        } else {
            PowerFlow::Idle
        }
    }

    /// Replaces Vrms_grid and Irms (e.g. with smoothed values) and rederives
    /// S and PF from them.
    pub fn with_grid_values(self, vrms_grid: f64, irms: f64) -> Self {
        let apparent_power = apparent_power(vrms_grid, irms);
        Self {
            vrms_grid,
            irms,
            apparent_power,
            power_factor: power_factor(self.real_power(), apparent_power),
            ..self
        }
    }
}

/// Window-final conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsParams {
    pub volt_factor: f64,
    pub final_table: SensitivityTable,
}

pub fn apparent_power(vrms_grid: f64, irms: f64) -> f64 {
    vrms_grid * irms
}

/// `P / S`, or 0 when there is no apparent power.
pub fn power_factor(real_power: f64, apparent_power: f64) -> f64 {
    if apparent_power != 0.0 {
        real_power / apparent_power
    } else {
        0.0
    }
}

pub fn compute_metrics(sums: &AccumulatedSums, params: &MetricsParams) -> Result<MeasurementResult> {
    if sums.samples == 0 {
        return Err(MeterError::EmptyWindow);
    }
    let n = sums.samples as f64;

    let vrms_current = (sums.sum_i_sq / n).sqrt() / 1000.0;
    let vrms_sensor = (sums.sum_v_sq / n).sqrt() / 1000.0;
    let vrms_grid = vrms_sensor * params.volt_factor;
    let irms = params.final_table.to_amps(vrms_current);

    let result = MeasurementResult {
        vrms_current,
        vrms_sensor,
        active_power: sums.sum_p / n,
        ..Default::default()
    };
    Ok(result.with_grid_values(vrms_grid, irms))
}
