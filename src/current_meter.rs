use crate::calibration::calibrate_channel;
use crate::error::{MeterError, Result};
use crate::sample_source::{Channel, Clock, SampleSource};
use crate::sensitivity::SensitivityTable;

/// Result of the single-channel current meter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurrentReading {
    /// RMS voltage on the current channel, in volts.
    pub vrms: f64,
    pub irms: f64,
}

/// Current-only meter: the offset is re-measured at the start of every
/// cycle, then a second batch of reads gives the RMS. No noise gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentMeter {
    /// Reads averaged into the per-cycle offset.
    pub calibration_samples: usize,
    pub samples: usize,
    pub sample_delay_us: u64,
    pub table: SensitivityTable,
}

impl CurrentMeter {
    pub fn measure<S, C>(&self, source: &mut S, clock: &mut C) -> Result<CurrentReading>
    where
        S: SampleSource + ?Sized,
        C: Clock + ?Sized,
    {
        if self.samples == 0 || self.calibration_samples == 0 {
            return Err(MeterError::EmptyWindow);
        }

        let offset = calibrate_channel(
            source,
            clock,
            Channel::Current,
            self.calibration_samples,
            self.sample_delay_us,
        )?;

        let mut sum_sq = 0.0;
        for _ in 0..self.samples {
            let diff = f64::from(source.read_mv(Channel::Current)?) - offset;
            sum_sq += diff * diff;
            if self.sample_delay_us > 0 {
                clock.delay_us(self.sample_delay_us);
            }
        }

        let vrms = (sum_sq / self.samples as f64).sqrt() / 1000.0;
        Ok(CurrentReading {
            vrms,
            irms: self.table.to_amps(vrms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_source::{OversampledSource, SineSource};
    use crate::sensitivity::TABLE_C;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;

    struct NoDelay;

    impl Clock for NoDelay {
        fn delay_us(&mut self, _us: u64) {}
    }

    struct Sequence(VecDeque<u32>);

    impl SampleSource for Sequence {
        fn read_mv(&mut self, channel: Channel) -> Result<u32> {
            assert_eq!(channel, Channel::Current);
            self.0.pop_front().ok_or(MeterError::HardwareRead {
                channel,
                reason: "sequence exhausted".to_string(),
            })
        }
    }

    fn meter(samples: usize) -> CurrentMeter {
        CurrentMeter {
            calibration_samples: samples,
            samples,
            sample_delay_us: 0,
            table: TABLE_C,
        }
    }

    #[test]
    fn test_offset_from_first_batch_rms_from_second() {
        // Offset batch averages 1000, measurement batch swings +-300 around it
        let mut reads = vec![900, 1100, 1000, 1000];
        reads.extend([1300, 700, 1300, 700]);
        let mut source = Sequence(reads.into());

        let reading = meter(4).measure(&mut source, &mut NoDelay).unwrap();

        assert_relative_eq!(reading.vrms, 0.3, max_relative = 1e-12);
        assert_relative_eq!(reading.irms, 0.3 / 0.14, max_relative = 1e-12);
        assert!(source.0.is_empty());
    }

    #[test]
    fn test_offset_batch_sized_independently() {
        // Three offset reads averaging 1000, then two measurement reads
        let mut source = Sequence(vec![990, 1000, 1010, 1200, 800].into());
        let meter = CurrentMeter {
            calibration_samples: 3,
            ..meter(2)
        };

        let reading = meter.measure(&mut source, &mut NoDelay).unwrap();

        assert_relative_eq!(reading.vrms, 0.2, max_relative = 1e-12);
        assert!(source.0.is_empty());
    }

    #[test]
    fn test_no_noise_gate() {
        let mut source = Sequence(vec![1000, 1000, 1001, 999].into());
        let reading = meter(2).measure(&mut source, &mut NoDelay).unwrap();
        assert_relative_eq!(reading.vrms, 0.001, max_relative = 1e-12);
        assert_relative_eq!(reading.irms, 0.001 / 0.27, max_relative = 1e-12);
    }

    #[test]
    fn test_large_signal_uses_top_band() {
        let mut source = Sequence(vec![2000, 2000, 2500, 1500].into());
        let reading = meter(2).measure(&mut source, &mut NoDelay).unwrap();
        assert_relative_eq!(reading.vrms, 0.5, max_relative = 1e-12);
        assert_relative_eq!(reading.irms, 0.5 / 0.132, max_relative = 1e-12);
    }

    #[test]
    fn test_sine_through_oversampling() {
        // 10 reads of 20us per sample: each batch of 100 spans one 50 Hz cycle
        let sine = SineSource::new(1650.0)
            .with_current(400.0, 0.0)
            .with_read_step(std::time::Duration::from_micros(20));
        let mut source = OversampledSource::new(sine, 10);

        let reading = meter(100).measure(&mut source, &mut NoDelay).unwrap();

        let expected = 0.4 / 2f64.sqrt();
        assert!(
            (reading.vrms - expected).abs() / expected < 0.01,
            "vrms {}",
            reading.vrms
        );
    }

    #[test]
    fn test_empty_meter_rejected() {
        let mut source = Sequence(VecDeque::new());
        assert_eq!(
            meter(0).measure(&mut source, &mut NoDelay).unwrap_err(),
            MeterError::EmptyWindow
        );
        let no_offset_batch = CurrentMeter {
            calibration_samples: 0,
            ..meter(4)
        };
        assert_eq!(
            no_offset_batch.measure(&mut source, &mut NoDelay).unwrap_err(),
            MeterError::EmptyWindow
        );
    }
}
