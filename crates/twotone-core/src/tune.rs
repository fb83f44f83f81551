//! Frequency-split plan for two-tone transmission
//!
//! Both tones come out of one transmitter by sharing the analog local
//! oscillator (LO) and shifting each channel digitally:
//!
//! 1. Tune the LO to the midpoint between the tones and let the synthesizer
//!    settle wherever its step size allows (the *probe* tune).
//! 2. Read back the RF frequency it actually landed on.
//! 3. For each channel, leave the LO alone and program a manual digital
//!    up-conversion (DUC) offset of `tone - actual_rf`.
//!
//! ```text
//!                  lower            upper
//!                    │    actual RF   │
//!                    ▼        ▼       ▼
//!   ──────────────── ┼────────┼───────┼───────────►  f
//!                    ◄──duc0──┤
//!                             ├─duc1──►
//! ```
//!
//! Because the DUC has much finer resolution than the synthesizer, each tone
//! lands exactly on target even when the LO cannot.

use serde::{Deserialize, Serialize};

use crate::types::{PlanError, PlanResult};

/// How a tune request treats one element of the tuning chain.
///
/// Mirrors the driver's tuning-policy enum: the RF synthesizer and the DUC
/// each get their own policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TunePolicy {
    /// Let the driver pick a value for this element
    Auto,
    /// Program this element to an exact frequency in Hz
    Manual(f64),
    /// Leave this element untouched
    None,
}

/// A request to tune one transmit channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneRequest {
    /// Overall target frequency in Hz
    pub target_hz: f64,
    /// Policy for the RF synthesizer (analog LO)
    pub rf: TunePolicy,
    /// Policy for the digital up-converter
    pub duc: TunePolicy,
}

/// What the hardware actually settled on after a tune.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneResult {
    /// RF synthesizer frequency in Hz
    pub actual_rf_hz: f64,
    /// DUC offset in Hz
    pub actual_duc_hz: f64,
}

impl TuneResult {
    /// Overall frequency the channel is tuned to.
    pub fn overall_hz(&self) -> f64 {
        self.actual_rf_hz + self.actual_duc_hz
    }
}

/// The two-tone frequency-split plan.
///
/// Holds the lower tone and the separation; everything else is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoTonePlan {
    lower_hz: f64,
    separation_hz: f64,
}

impl TwoTonePlan {
    /// Number of tones (and therefore transmit channels) in the plan.
    pub const NUM_TONES: usize = 2;

    /// Create a plan for tones at `lower_hz` and `lower_hz + separation_hz`.
    pub fn new(lower_hz: f64, separation_hz: f64) -> PlanResult<Self> {
        if !(lower_hz > 0.0) {
            return Err(PlanError::NonPositiveFrequency(lower_hz));
        }
        if !(separation_hz > 0.0) {
            return Err(PlanError::NonPositiveSeparation(separation_hz));
        }
        Ok(Self {
            lower_hz,
            separation_hz,
        })
    }

    /// Lower tone in Hz.
    pub fn lower_hz(&self) -> f64 {
        self.lower_hz
    }

    /// Upper tone in Hz.
    pub fn upper_hz(&self) -> f64 {
        self.lower_hz + self.separation_hz
    }

    /// Separation between the tones in Hz.
    pub fn separation_hz(&self) -> f64 {
        self.separation_hz
    }

    /// Midpoint the shared LO aims for.
    pub fn lo_target_hz(&self) -> f64 {
        self.lower_hz + 0.5 * self.separation_hz
    }

    /// Tone frequency for a channel (0 = lower, 1 = upper).
    pub fn tone_hz(&self, channel: usize) -> PlanResult<f64> {
        match channel {
            0 => Ok(self.lower_hz),
            1 => Ok(self.upper_hz()),
            other => Err(PlanError::UnknownChannel(other)),
        }
    }

    /// The probe request: tune everything automatically to the midpoint.
    ///
    /// The caller reads the resulting RF frequency and feeds it to
    /// [`channel_request`](Self::channel_request).
    pub fn lo_request(&self) -> TuneRequest {
        TuneRequest {
            target_hz: self.lo_target_hz(),
            rf: TunePolicy::Auto,
            duc: TunePolicy::Auto,
        }
    }

    /// Per-channel request once the LO has settled at `actual_rf_hz`.
    ///
    /// RF is pinned where the probe tune parked it; the DUC makes up the
    /// difference to the tone.
    pub fn channel_request(&self, channel: usize, actual_rf_hz: f64) -> PlanResult<TuneRequest> {
        let tone = self.tone_hz(channel)?;
        Ok(TuneRequest {
            target_hz: tone,
            rf: TunePolicy::Manual(actual_rf_hz),
            duc: TunePolicy::Manual(tone - actual_rf_hz),
        })
    }
}

/// Does a DUC offset keep the tone inside the transmitted passband?
///
/// An offset beyond half the sample rate pushes the tone into the interpolation
/// filter skirt and it comes out attenuated or aliased.
pub fn duc_in_passband(duc_hz: f64, sample_rate: f64) -> bool {
    duc_hz.abs() <= sample_rate / 2.0
}
