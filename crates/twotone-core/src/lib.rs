//! # Two-Tone Core
//!
//! Hardware-free logic for the two-tone RF generator:
//!
//! - **tune**: the frequency-split plan that parks a shared local oscillator
//!   between the two tones and computes per-channel digital up-conversion
//!   (DUC) offsets
//! - **waveform**: the constant-envelope sample buffer the transmitter
//!   streams forever
//! - **types**: I/Q sample aliases and validation errors
//!
//! Everything in this crate is pure and testable without a radio attached.
//! Driver interaction lives in `twotone-sdr`.

pub mod tune;
pub mod types;
pub mod waveform;

// Re-exports
pub use tune::{duc_in_passband, TunePolicy, TuneRequest, TuneResult, TwoTonePlan};
pub use types::{IQBuffer, IQSample, PlanError, PlanResult};
pub use waveform::{fill_constant, make_buffer, validate_amplitude, MAX_AMPLITUDE};
