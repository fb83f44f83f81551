//! Device abstraction for transmit-capable SDRs
//!
//! This module defines the interface the transmit job drives: a device that
//! can be clocked, tuned per channel, gained, and streamed to. Backends
//! implement [`TxDevice`] and hand out [`TxStream`]s.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use twotone_core::tune::{TuneRequest, TuneResult};
use twotone_core::types::{IQSample, PlanError};

/// Result type for SDR operations
pub type SdrResult<T> = Result<T, SdrError>;

/// Errors that can occur during SDR operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SdrError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Hardware error: {0}")]
    HardwareError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Stream not active")]
    NotStarted,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<PlanError> for SdrError {
    fn from(e: PlanError) -> Self {
        SdrError::ConfigError(e.to_string())
    }
}

/// Reference clock source for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockSource {
    /// Internal oscillator
    #[default]
    Internal,
    /// External 10 MHz reference input
    External,
    /// MIMO cable (for multi-device sync)
    Mimo,
    /// GPS disciplined oscillator
    Gpsdo,
}

impl ClockSource {
    /// Driver-side spelling of the source.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClockSource::Internal => "internal",
            ClockSource::External => "external",
            ClockSource::Mimo => "mimo",
            ClockSource::Gpsdo => "gpsdo",
        }
    }
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClockSource {
    type Err = SdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "internal" => Ok(ClockSource::Internal),
            "external" => Ok(ClockSource::External),
            "mimo" => Ok(ClockSource::Mimo),
            "gpsdo" => Ok(ClockSource::Gpsdo),
            other => Err(SdrError::ConfigError(format!(
                "Unknown clock reference: {}. Use internal, external, mimo, or gpsdo",
                other
            ))),
        }
    }
}

/// Transmit configuration assembled from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxConfig {
    /// Device address args (driver key=value pairs)
    pub args: String,
    /// Sample rate in S/s
    pub sample_rate: f64,
    /// TX gain in dB; `None` leaves the chain at its power-on gain
    pub gain_db: Option<f64>,
    /// Waveform amplitude per rail
    pub amplitude: f32,
    /// Reference clock source
    pub clock_source: ClockSource,
    /// Transmit channels, one per tone
    pub channels: Vec<usize>,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            args: String::new(),
            sample_rate: 625_000.0,
            gain_db: None,
            amplitude: 0.3,
            clock_source: ClockSource::Internal,
            channels: vec![0, 1],
        }
    }
}

/// A transmit-capable SDR device.
pub trait TxDevice: Send {
    /// Device name/description.
    fn name(&self) -> &str;

    /// Number of transmit channels the hardware exposes.
    fn num_tx_channels(&self) -> SdrResult<usize>;

    /// Select the reference clock source.
    fn set_clock_source(&mut self, source: ClockSource) -> SdrResult<()>;

    /// Set the sample rate on a channel. Returns the actual rate.
    fn set_sample_rate(&mut self, channel: usize, rate: f64) -> SdrResult<f64>;

    /// Tune one channel. Returns where the RF synthesizer and DUC settled.
    fn tune(&mut self, channel: usize, request: &TuneRequest) -> SdrResult<TuneResult>;

    /// Overall frequency a channel is currently tuned to.
    fn tx_frequency(&self, channel: usize) -> SdrResult<f64>;

    /// Set TX gain on a channel. Returns the actual gain.
    fn set_tx_gain(&mut self, channel: usize, gain_db: f64) -> SdrResult<f64>;

    /// LO lock state for a channel; `None` when the sensor is not exposed.
    fn lo_locked(&self, channel: usize) -> SdrResult<Option<bool>>;

    /// Reference lock state; `None` when the sensor is not exposed.
    fn ref_locked(&self) -> SdrResult<Option<bool>>;

    /// Open a CF32 transmit stream on the given channels.
    fn tx_stream<'a>(&'a mut self, channels: &[usize]) -> SdrResult<Box<dyn TxStream + 'a>>;
}

/// A transmit sample stream.
pub trait TxStream {
    /// Maximum transmission unit in samples per channel.
    fn mtu(&self) -> SdrResult<usize>;

    /// Start streaming.
    fn activate(&mut self) -> SdrResult<()>;

    /// Write one buffer per channel; all buffers must be the same length.
    ///
    /// Returns the number of samples written per channel. `end_burst` marks
    /// the final write of a burst.
    fn write(&mut self, buffers: &[&[IQSample]], end_burst: bool) -> SdrResult<usize>;

    /// Stop streaming.
    fn deactivate(&mut self) -> SdrResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_source_parsing() {
        assert_eq!("internal".parse::<ClockSource>().unwrap(), ClockSource::Internal);
        assert_eq!("EXTERNAL".parse::<ClockSource>().unwrap(), ClockSource::External);
        assert_eq!("mimo".parse::<ClockSource>().unwrap(), ClockSource::Mimo);
        assert_eq!("gpsdo".parse::<ClockSource>().unwrap(), ClockSource::Gpsdo);
        assert!("ocxo".parse::<ClockSource>().is_err());
    }

    #[test]
    fn test_clock_source_round_trip() {
        for source in [
            ClockSource::Internal,
            ClockSource::External,
            ClockSource::Mimo,
            ClockSource::Gpsdo,
        ] {
            assert_eq!(source.as_str().parse::<ClockSource>().unwrap(), source);
        }
    }

    #[test]
    fn test_tx_config_default_matches_original_tool() {
        let config = TxConfig::default();
        assert_eq!(config.sample_rate, 625_000.0);
        assert_eq!(config.amplitude, 0.3);
        assert_eq!(config.clock_source, ClockSource::Internal);
        assert_eq!(config.channels, vec![0, 1]);
        assert!(config.gain_db.is_none());
    }

    #[test]
    fn test_plan_error_converts_to_config_error() {
        let err: SdrError = PlanError::AmplitudeOutOfRange(0.9).into();
        assert!(matches!(err, SdrError::ConfigError(_)));
    }
}
