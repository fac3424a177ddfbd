use thiserror::Error;

use crate::sample_source::Channel;

pub type Result<T> = std::result::Result<T, MeterError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeterError {
    /// The sample source could not produce a reading. There is no data path
    /// without it, so callers treat this as fatal.
    #[error("Failed to read {channel} channel: {reason}")]
    HardwareRead { channel: Channel, reason: String },

    #[error("Telemetry send failed: {0}")]
    Telemetry(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sample window must contain at least one sample")]
    EmptyWindow,
}
