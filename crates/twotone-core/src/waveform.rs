//! Constant-envelope waveform
//!
//! The transmitted baseband signal is a single constant complex sample,
//! `ampl + j*ampl`, repeated forever. The tone placement happens entirely in
//! the device's digital up-converters; the buffer itself never changes.

use crate::types::{IQBuffer, IQSample, PlanError, PlanResult};

/// Largest amplitude that keeps the summed I/Q swing inside the DAC range.
pub const MAX_AMPLITUDE: f32 = 0.7;

/// Validate an amplitude against the DAC-safe range `[0, MAX_AMPLITUDE]`.
pub fn validate_amplitude(ampl: f32) -> PlanResult<f32> {
    if (0.0..=MAX_AMPLITUDE).contains(&ampl) {
        Ok(ampl)
    } else {
        Err(PlanError::AmplitudeOutOfRange(ampl))
    }
}

/// Fill `buffer` with the constant sample `ampl + j*ampl`.
pub fn fill_constant(buffer: &mut [IQSample], ampl: f32) {
    let sample = IQSample::new(ampl, ampl);
    buffer.fill(sample);
}

/// Allocate a buffer of `len` samples, all equal to `ampl + j*ampl`.
///
/// The amplitude is validated first; an out-of-range value would otherwise
/// clip at the DAC and spray intermodulation products across the band.
pub fn make_buffer(len: usize, ampl: f32) -> PlanResult<IQBuffer> {
    let ampl = validate_amplitude(ampl)?;
    Ok(vec![IQSample::new(ampl, ampl); len])
}
