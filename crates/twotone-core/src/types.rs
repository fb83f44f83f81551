//! Core types for the two-tone generator
//!
//! Samples are complex `f32` (CF32) because that is the format the transmit
//! path uses end to end: the buffer is filled once with a constant complex
//! value and handed to the driver's CF32 stream unchanged.

use num_complex::Complex;

/// A single I/Q sample point (CF32)
pub type IQSample = Complex<f32>;

/// A buffer of I/Q samples
pub type IQBuffer = Vec<IQSample>;

/// Result type for planning and validation
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors from parameter validation and tune planning
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("Frequency must be positive, got {0} Hz")]
    NonPositiveFrequency(f64),

    #[error("Tone separation must be positive, got {0} Hz")]
    NonPositiveSeparation(f64),

    #[error("Amplitude {0} out of range [0, 0.7]")]
    AmplitudeOutOfRange(f32),

    #[error("No tone on channel {0}; the plan has exactly two tones")]
    UnknownChannel(usize),
}
