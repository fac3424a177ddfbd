//! AC Power Meter Library
//!
//! This library turns two analog sensor channels (grid voltage and load current)
//! into RMS voltage, RMS current, active power, apparent power and power factor,
//! and reports each cycle to the console and optionally to an HTTP collector.

pub mod accumulator;
pub mod calibration;
pub mod config;
pub mod current_meter;
pub mod error;
pub mod metrics;
pub mod power_meter;
pub mod report;
pub mod sample_source;
pub mod sensitivity;
pub mod smoothing;
pub mod telemetry;

// Re-export commonly used types for easier access
pub use config::{MeterConfig, MeterVariant};
pub use error::MeterError;
pub use metrics::MeasurementResult;
pub use power_meter::{Measurement, MeterLoop, PowerMeter};
pub use sample_source::{Channel, Clock, SampleSource, SineSource, SpinClock};
pub use telemetry::TelemetryClient;
