use crate::calibration::CalibrationOffsets;
use crate::error::{MeterError, Result};
use crate::sample_source::{Channel, Clock, SampleSource};
use crate::sensitivity::SensitivityTable;

/// Deviations smaller than the threshold (strictly) are treated as noise and
/// zeroed. A deviation equal to the threshold passes through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseGate {
    pub voltage_mv: f64,
    pub current_mv: f64,
}

impl NoiseGate {
    pub const fn uniform(threshold_mv: f64) -> Self {
        Self {
            voltage_mv: threshold_mv,
            current_mv: threshold_mv,
        }
    }

    pub fn apply(&self, channel: Channel, diff_mv: f64) -> f64 {
        let threshold = match channel {
            Channel::Voltage => self.voltage_mv,
            Channel::Current => self.current_mv,
        };
        if diff_mv.abs() < threshold {
            0.0
        } else {
            diff_mv
        }
    }
}

/// Everything the accumulation loop needs besides the source and the offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParams {
    pub samples: usize,
    pub sample_delay_us: u64,
    pub gate: NoiseGate,
    /// Sensor volts to grid volts.
    pub volt_factor: f64,
    /// Curve applied to the running current estimate of each sample.
    pub sample_table: SensitivityTable,
}

/// Running sums of one sample window. `sum_p` keeps its sign.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccumulatedSums {
    pub sum_v_sq: f64,
    pub sum_i_sq: f64,
    pub sum_p: f64,
    pub samples: usize,
}

impl AccumulatedSums {
    /// Folds one voltage/current pair into the sums.
    ///
    /// The current sensitivity is picked from the RMS estimate of the samples
    /// seen so far in this window, including this one, because the curve is
    /// non-linear in the current magnitude.
    pub fn add_sample(
        &mut self,
        raw_v_mv: u32,
        raw_i_mv: u32,
        offsets: &CalibrationOffsets,
        params: &WindowParams,
    ) {
        let diff_v = params
            .gate
            .apply(Channel::Voltage, f64::from(raw_v_mv) - offsets.voltage_mv);
        let diff_i = params
            .gate
            .apply(Channel::Current, f64::from(raw_i_mv) - offsets.current_mv);

        self.sum_v_sq += diff_v * diff_v;
        self.sum_i_sq += diff_i * diff_i;
        self.samples += 1;

        let v_real = (diff_v / 1000.0) * params.volt_factor;
        let partial_vrms = self.partial_current_vrms();
        let i_real = (diff_i / 1000.0) / params.sample_table.sensitivity(partial_vrms);

        self.sum_p += v_real * i_real;
    }

    /// RMS of the current channel over the samples accumulated so far, in volts.
    pub fn partial_current_vrms(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        (self.sum_i_sq / self.samples as f64).sqrt() / 1000.0
    }
}

/// Reads `params.samples` voltage/current pairs, voltage first, pausing
/// `params.sample_delay_us` after each pair.
pub fn accumulate_window<S, C>(
    source: &mut S,
    clock: &mut C,
    offsets: &CalibrationOffsets,
    params: &WindowParams,
) -> Result<AccumulatedSums>
where
    S: SampleSource + ?Sized,
    C: Clock + ?Sized,
{
    if params.samples == 0 {
        return Err(MeterError::EmptyWindow);
    }

    let mut sums = AccumulatedSums::default();
    for _ in 0..params.samples {
        let raw_v = source.read_mv(Channel::Voltage)?;
        let raw_i = source.read_mv(Channel::Current)?;
        sums.add_sample(raw_v, raw_i, offsets, params);
        clock.delay_us(params.sample_delay_us);
    }
    Ok(sums)
}
