//! Console rendering of the per-cycle results.

use crate::current_meter::CurrentReading;
use crate::metrics::MeasurementResult;

pub fn status_line(result: &MeasurementResult) -> String {
    format!(
        "Vrms_current: {:.4} V | Vrms_sensor: {:.4} V | Vrms_grid: {:.1} V | Irms: {:.3} A | P: {:.3} W | S: {:.3} VA | PF: {:.3}",
        result.vrms_current,
        result.vrms_sensor,
        result.vrms_grid,
        result.irms,
        result.real_power(),
        result.apparent_power,
        result.power_factor
    )
}

/// `value` as the status line prints it with `decimals` places, so other
/// outputs agree with the console digit for digit.
pub fn displayed(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

pub fn current_status_line(reading: &CurrentReading) -> String {
    format!("Vrms = {:.4} V | Irms = {:.3} A", reading.vrms, reading.irms)
}
