use std::f64::consts::PI;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// The two analog inputs of the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Voltage,
    Current,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Voltage => write!(f, "voltage"),
            Channel::Current => write!(f, "current"),
        }
    }
}

/// Produces calibrated millivolt readings on demand.
/// ADC setup and characterization happen below this layer.
pub trait SampleSource {
    fn read_mv(&mut self, channel: Channel) -> Result<u32>;
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn read_mv(&mut self, channel: Channel) -> Result<u32> {
        (**self).read_mv(channel)
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_mv(&mut self, channel: Channel) -> Result<u32> {
        (**self).read_mv(channel)
    }
}

/// Cooperative delay primitive used to pace the sample windows.
pub trait Clock {
    fn delay_us(&mut self, us: u64);

    fn delay_ms(&mut self, ms: u64) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

/// Clock backed by `spin_sleep`, which keeps sub-millisecond delays close to
/// their nominal length where a plain thread sleep would overshoot.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinClock;

impl Clock for SpinClock {
    fn delay_us(&mut self, us: u64) {
        spin_sleep::sleep(Duration::from_micros(us));
    }
}

/// Simulated sensor front end: a DC bias with a sinusoid on each channel.
///
/// Time advances by a fixed step on every read, so two reads (one per
/// channel) cover one nominal sample period.
#[derive(Debug, Clone)]
pub struct SineSource {
    bias_mv: f64,
    voltage_amplitude_mv: f64,
    current_amplitude_mv: f64,
    current_phase_rad: f64,
    frequency_hz: f64,
    read_step_s: f64,
    elapsed_s: f64,
}

impl SineSource {
    pub fn new(bias_mv: f64) -> Self {
        Self {
            bias_mv,
            voltage_amplitude_mv: 0.0,
            current_amplitude_mv: 0.0,
            current_phase_rad: 0.0,
            frequency_hz: 50.0,
            read_step_s: 50e-6,
            elapsed_s: 0.0,
        }
    }

    pub fn with_voltage(mut self, amplitude_mv: f64) -> Self {
        self.voltage_amplitude_mv = amplitude_mv;
        self
    }

    /// Current amplitude and its lag behind the voltage, in degrees.
    pub fn with_current(mut self, amplitude_mv: f64, lag_deg: f64) -> Self {
        self.current_amplitude_mv = amplitude_mv;
        self.current_phase_rad = -lag_deg * PI / 180.0;
        self
    }

    pub fn with_read_step(mut self, step: Duration) -> Self {
        self.read_step_s = step.as_secs_f64();
        self
    }

    fn value_at(&self, channel: Channel) -> f64 {
        let angle = 2.0 * PI * self.frequency_hz * self.elapsed_s;
        match channel {
            Channel::Voltage => self.bias_mv + self.voltage_amplitude_mv * angle.sin(),
            Channel::Current => {
                self.bias_mv + self.current_amplitude_mv * (angle + self.current_phase_rad).sin()
            }
        }
    }
}

impl SampleSource for SineSource {
    fn read_mv(&mut self, channel: Channel) -> Result<u32> {
        let value = self.value_at(channel).round().max(0.0);
        self.elapsed_s += self.read_step_s;
        Ok(value as u32)
    }
}

/// Averages several consecutive reads into one, using integer division.
#[derive(Debug, Clone)]
pub struct OversampledSource<S> {
    inner: S,
    reads: u32,
}

impl<S: SampleSource> OversampledSource<S> {
    pub fn new(inner: S, reads: u32) -> Self {
        Self {
            inner,
            reads: reads.max(1),
        }
    }
}

impl<S: SampleSource> SampleSource for OversampledSource<S> {
    fn read_mv(&mut self, channel: Channel) -> Result<u32> {
        let mut total: u64 = 0;
        for _ in 0..self.reads {
            total += u64::from(self.inner.read_mv(channel)?);
        }
        Ok((total / u64::from(self.reads)) as u32)
    }
}
