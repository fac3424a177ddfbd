use crate::error::{MeterError, Result};
use crate::metrics::MeasurementResult;

/// How Vrms_grid and Irms are filtered between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SmoothingPolicy {
    /// Each cycle reports its own raw values.
    #[default]
    Passthrough,
    /// `ema = weight * raw + (1 - weight) * ema`, seeded with the first value.
    Exponential { weight: f64 },
}

impl SmoothingPolicy {
    pub fn exponential(weight: f64) -> Result<Self> {
        if weight > 0.0 && weight <= 1.0 {
            Ok(SmoothingPolicy::Exponential { weight })
        } else {
            Err(MeterError::InvalidConfig(format!(
                "EMA weight must be in (0, 1], got {weight}"
            )))
        }
    }
}

/// Exponential moving average of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ema {
    value: Option<f64>,
}

impl Ema {
    /// Adds a sample and returns the filtered value.
    pub fn add(&mut self, raw: f64, weight: f64) -> f64 {
        let next = match self.value {
            Some(previous) => weight * raw + (1.0 - weight) * previous,
            None => raw,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Cross-cycle filter state for the grid voltage and the current.
#[derive(Debug, Clone, Default)]
pub struct Smoother {
    policy: SmoothingPolicy,
    vrms_grid: Ema,
    irms: Ema,
}

impl Smoother {
    pub fn new(policy: SmoothingPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Filters Vrms_grid and Irms of `raw` and rederives S and PF.
    pub fn apply(&mut self, raw: MeasurementResult) -> MeasurementResult {
        match self.policy {
            SmoothingPolicy::Passthrough => {
                self.vrms_grid = Ema {
                    value: Some(raw.vrms_grid),
                };
                self.irms = Ema {
                    value: Some(raw.irms),
                };
                raw
            }
            SmoothingPolicy::Exponential { weight } => {
                let vrms_grid = self.vrms_grid.add(raw.vrms_grid, weight);
                let irms = self.irms.add(raw.irms, weight);
                raw.with_grid_values(vrms_grid, irms)
            }
        }
    }

    pub fn last_vrms_grid(&self) -> Option<f64> {
        self.vrms_grid.value()
    }

    pub fn last_irms(&self) -> Option<f64> {
        self.irms.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reading(vrms_grid: f64, irms: f64, active_power: f64) -> MeasurementResult {
        MeasurementResult {
            active_power,
            ..Default::default()
        }
        .with_grid_values(vrms_grid, irms)
    }

    #[test]
    fn test_passthrough_reports_raw_every_cycle() {
        let mut smoother = Smoother::default();
        let first = reading(230.0, 1.0, 200.0);
        let second = reading(120.0, 4.0, 300.0);

        assert_eq!(smoother.apply(first), first);
        assert_eq!(smoother.apply(second), second);
        assert_eq!(smoother.last_vrms_grid(), Some(120.0));
        assert_eq!(smoother.last_irms(), Some(4.0));
    }

    #[test]
    fn test_exponential_seeds_with_first_value() {
        let mut smoother = Smoother::new(SmoothingPolicy::exponential(0.2).unwrap());
        let first = reading(230.0, 2.0, 400.0);
        assert_eq!(smoother.apply(first), first);
    }

    #[test]
    fn test_exponential_filters_and_rederives_apparent_power() {
        let mut smoother = Smoother::new(SmoothingPolicy::exponential(0.5).unwrap());
        smoother.apply(reading(200.0, 2.0, 100.0));
        let out = smoother.apply(reading(240.0, 4.0, 100.0));

        assert_relative_eq!(out.vrms_grid, 220.0);
        assert_relative_eq!(out.irms, 3.0);
        assert_relative_eq!(out.apparent_power, 660.0);
        assert_relative_eq!(out.power_factor, 100.0 / 660.0);
        assert_eq!(out.active_power, 100.0);
    }

    #[test]
    fn test_weight_one_behaves_like_passthrough() {
        let mut smoother = Smoother::new(SmoothingPolicy::exponential(1.0).unwrap());
        smoother.apply(reading(200.0, 2.0, 100.0));
        let next = reading(240.0, 4.0, 100.0);
        assert_eq!(smoother.apply(next), next);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        for weight in [0.0, -0.1, 1.01, f64::NAN] {
            assert!(SmoothingPolicy::exponential(weight).is_err(), "{weight}");
        }
    }

    #[test]
    fn test_ema_converges_to_constant_input() {
        let mut ema = Ema::default();
        ema.add(0.0, 0.3);
        let mut last = 0.0;
        for _ in 0..100 {
            last = ema.add(10.0, 0.3);
        }
        assert_relative_eq!(last, 10.0, epsilon = 1e-9);
    }
}
