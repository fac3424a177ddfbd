use crate::error::{MeterError, Result};
use crate::sample_source::{Channel, Clock, SampleSource};
use tracing::info;

/// DC bias of each channel in millivolts, measured once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationOffsets {
    pub voltage_mv: f64,
    pub current_mv: f64,
}

impl CalibrationOffsets {
    pub fn for_channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Voltage => self.voltage_mv,
            Channel::Current => self.current_mv,
        }
    }
}

/// Averages `samples` consecutive reads of both channels with the sensors at
/// rest. The current channel is read first in each pair.
pub fn calibrate_offsets<S, C>(
    source: &mut S,
    clock: &mut C,
    samples: usize,
    delay_us: u64,
) -> Result<CalibrationOffsets>
where
    S: SampleSource + ?Sized,
    C: Clock + ?Sized,
{
    if samples == 0 {
        return Err(MeterError::EmptyWindow);
    }

    let mut sum_v = 0.0;
    let mut sum_i = 0.0;
    for _ in 0..samples {
        sum_i += f64::from(source.read_mv(Channel::Current)?);
        sum_v += f64::from(source.read_mv(Channel::Voltage)?);
        clock.delay_us(delay_us);
    }

    let offsets = CalibrationOffsets {
        voltage_mv: sum_v / samples as f64,
        current_mv: sum_i / samples as f64,
    };
    info!(
        "Offset measured: offset_i = {:.2} mV, offset_v = {:.2} mV",
        offsets.current_mv, offsets.voltage_mv
    );
    Ok(offsets)
}

/// Mean of `samples` reads of a single channel.
pub fn calibrate_channel<S, C>(
    source: &mut S,
    clock: &mut C,
    channel: Channel,
    samples: usize,
    delay_us: u64,
) -> Result<f64>
where
    S: SampleSource + ?Sized,
    C: Clock + ?Sized,
{
    if samples == 0 {
        return Err(MeterError::EmptyWindow);
    }

    let mut sum = 0.0;
    for _ in 0..samples {
        sum += f64::from(source.read_mv(channel)?);
        if delay_us > 0 {
            clock.delay_us(delay_us);
        }
    }
    Ok(sum / samples as f64)
}
