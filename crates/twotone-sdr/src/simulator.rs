//! Software SDR simulator
//!
//! A pure-software stand-in for a two-channel transmitter, used by the test
//! suite and by `--simulate` runs. It models the one hardware behavior the
//! tune plan depends on: the RF synthesizer only settles on a frequency grid,
//! so an auto tune usually misses the target and the DUC makes up the rest.
//!
//! Written samples are recorded (up to a bound) so tests can assert on the
//! exact waveform the job streamed.

use tracing::debug;
use twotone_core::tune::{TunePolicy, TuneRequest, TuneResult};
use twotone_core::types::IQSample;

use crate::device::{ClockSource, SdrError, SdrResult, TxDevice, TxStream};

/// Synthesizer step the simulator quantizes RF tunes to.
pub const DEFAULT_LO_STEP_HZ: f64 = 25_000.0;

/// Gain range modeled after a typical USRP TX chain.
const GAIN_RANGE_DB: (f64, f64) = (0.0, 76.0);

/// Samples retained per channel for test inspection.
const CAPTURE_LIMIT: usize = 65_536;

#[derive(Debug, Clone)]
struct SimChannel {
    sample_rate: f64,
    rf_hz: f64,
    duc_hz: f64,
    gain_db: f64,
    tuned: bool,
}

impl Default for SimChannel {
    fn default() -> Self {
        Self {
            sample_rate: 1_000_000.0,
            rf_hz: 915_000_000.0,
            duc_hz: 0.0,
            gain_db: 0.0,
            tuned: false,
        }
    }
}

/// Simulated two-channel transmit device.
pub struct SimDevice {
    name: String,
    lo_step_hz: f64,
    clock_source: ClockSource,
    external_ref_present: bool,
    channels: Vec<SimChannel>,
    captured: Vec<Vec<IQSample>>,
    buffers_written: u64,
    samples_written: u64,
    end_burst_seen: bool,
}

impl SimDevice {
    /// Stream MTU in samples per channel.
    pub const MTU: usize = 2048;

    /// Create a two-channel simulator with the default synthesizer step.
    pub fn new() -> Self {
        Self::with_lo_step(DEFAULT_LO_STEP_HZ)
    }

    /// Create a simulator whose RF synthesizer quantizes to `lo_step_hz`.
    pub fn with_lo_step(lo_step_hz: f64) -> Self {
        let num_channels = 2;
        Self {
            name: "Two-tone simulator".to_string(),
            lo_step_hz,
            clock_source: ClockSource::Internal,
            external_ref_present: true,
            channels: vec![SimChannel::default(); num_channels],
            captured: vec![Vec::new(); num_channels],
            buffers_written: 0,
            samples_written: 0,
            end_burst_seen: false,
        }
    }

    /// Pretend the 10 MHz bench reference is (dis)connected.
    pub fn set_external_ref_present(&mut self, present: bool) {
        self.external_ref_present = present;
    }

    fn channel(&self, channel: usize) -> SdrResult<&SimChannel> {
        self.channels
            .get(channel)
            .ok_or_else(|| SdrError::ConfigError(format!("No such TX channel: {}", channel)))
    }

    fn channel_mut(&mut self, channel: usize) -> SdrResult<&mut SimChannel> {
        self.channels
            .get_mut(channel)
            .ok_or_else(|| SdrError::ConfigError(format!("No such TX channel: {}", channel)))
    }

    // Test inspection -------------------------------------------------------

    /// Samples captured on a channel (bounded by an internal limit).
    pub fn captured(&self, channel: usize) -> &[IQSample] {
        &self.captured[channel]
    }

    /// RF synthesizer frequency of a channel.
    pub fn rf_hz(&self, channel: usize) -> f64 {
        self.channels[channel].rf_hz
    }

    /// DUC offset of a channel.
    pub fn duc_hz(&self, channel: usize) -> f64 {
        self.channels[channel].duc_hz
    }

    /// Gain of a channel.
    pub fn gain_db(&self, channel: usize) -> f64 {
        self.channels[channel].gain_db
    }

    /// Currently selected clock source.
    pub fn clock_source(&self) -> ClockSource {
        self.clock_source
    }

    /// Total buffers written across all stream activations.
    pub fn buffers_written(&self) -> u64 {
        self.buffers_written
    }

    /// Total samples written per channel.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Whether an end-of-burst write was observed.
    pub fn end_burst_seen(&self) -> bool {
        self.end_burst_seen
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TxDevice for SimDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_tx_channels(&self) -> SdrResult<usize> {
        Ok(self.channels.len())
    }

    fn set_clock_source(&mut self, source: ClockSource) -> SdrResult<()> {
        debug!("simulator: clock source -> {}", source);
        self.clock_source = source;
        Ok(())
    }

    fn set_sample_rate(&mut self, channel: usize, rate: f64) -> SdrResult<f64> {
        if !(rate > 0.0) {
            return Err(SdrError::ConfigError(format!(
                "Sample rate must be positive, got {}",
                rate
            )));
        }
        self.channel_mut(channel)?.sample_rate = rate;
        Ok(rate)
    }

    fn tune(&mut self, channel: usize, request: &TuneRequest) -> SdrResult<TuneResult> {
        let step = self.lo_step_hz;
        let target = request.target_hz;
        let chan = self.channel_mut(channel)?;

        match request.rf {
            // Auto aims the synthesizer at the overall target
            TunePolicy::Auto => chan.rf_hz = (target / step).round() * step,
            TunePolicy::Manual(rf) => chan.rf_hz = (rf / step).round() * step,
            TunePolicy::None => {}
        }
        match request.duc {
            // The DUC has fine resolution; auto compensates the LO error
            TunePolicy::Auto => chan.duc_hz = target - chan.rf_hz,
            TunePolicy::Manual(duc) => chan.duc_hz = duc,
            TunePolicy::None => {}
        }
        chan.tuned = true;

        debug!(
            "simulator: tuned channel {} rf={} Hz duc={} Hz",
            channel, chan.rf_hz, chan.duc_hz
        );
        Ok(TuneResult {
            actual_rf_hz: chan.rf_hz,
            actual_duc_hz: chan.duc_hz,
        })
    }

    fn tx_frequency(&self, channel: usize) -> SdrResult<f64> {
        let chan = self.channel(channel)?;
        Ok(chan.rf_hz + chan.duc_hz)
    }

    fn set_tx_gain(&mut self, channel: usize, gain_db: f64) -> SdrResult<f64> {
        let clamped = gain_db.clamp(GAIN_RANGE_DB.0, GAIN_RANGE_DB.1);
        self.channel_mut(channel)?.gain_db = clamped;
        Ok(clamped)
    }

    fn lo_locked(&self, channel: usize) -> SdrResult<Option<bool>> {
        Ok(Some(self.channel(channel)?.tuned))
    }

    fn ref_locked(&self) -> SdrResult<Option<bool>> {
        match self.clock_source {
            ClockSource::External => Ok(Some(self.external_ref_present)),
            _ => Ok(Some(true)),
        }
    }

    fn tx_stream<'a>(&'a mut self, channels: &[usize]) -> SdrResult<Box<dyn TxStream + 'a>> {
        for &ch in channels {
            self.channel(ch)?;
        }
        Ok(Box::new(SimTxStream {
            channels: channels.to_vec(),
            active: false,
            dev: self,
        }))
    }
}

/// Transmit stream over a [`SimDevice`].
struct SimTxStream<'a> {
    dev: &'a mut SimDevice,
    channels: Vec<usize>,
    active: bool,
}

impl TxStream for SimTxStream<'_> {
    fn mtu(&self) -> SdrResult<usize> {
        Ok(SimDevice::MTU)
    }

    fn activate(&mut self) -> SdrResult<()> {
        self.active = true;
        Ok(())
    }

    fn write(&mut self, buffers: &[&[IQSample]], end_burst: bool) -> SdrResult<usize> {
        if !self.active {
            return Err(SdrError::NotStarted);
        }
        if buffers.len() != self.channels.len() {
            return Err(SdrError::StreamError(format!(
                "Expected {} channel buffers, got {}",
                self.channels.len(),
                buffers.len()
            )));
        }
        let len = buffers.first().map_or(0, |b| b.len());
        if buffers.iter().any(|b| b.len() != len) {
            return Err(SdrError::StreamError(
                "Channel buffers must have equal length".to_string(),
            ));
        }

        for (&ch, buf) in self.channels.iter().zip(buffers) {
            let captured = &mut self.dev.captured[ch];
            let room = CAPTURE_LIMIT.saturating_sub(captured.len());
            captured.extend_from_slice(&buf[..buf.len().min(room)]);
        }

        if len > 0 {
            self.dev.buffers_written += 1;
            self.dev.samples_written += len as u64;
        }
        if end_burst {
            self.dev.end_burst_seen = true;
        }
        Ok(len)
    }

    fn deactivate(&mut self) -> SdrResult<()> {
        self.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twotone_core::tune::TwoTonePlan;

    #[test]
    fn test_auto_tune_quantizes_rf_and_compensates() {
        let mut dev = SimDevice::with_lo_step(25_000.0);
        // 915.055 MHz is off the 25 kHz grid by 5 kHz
        let plan = TwoTonePlan::new(915.03e6, 50.0e3).unwrap();
        let res = dev.tune(0, &plan.lo_request()).unwrap();

        assert_eq!(res.actual_rf_hz % 25_000.0, 0.0);
        assert_eq!(res.overall_hz(), plan.lo_target_hz());
        assert_ne!(res.actual_duc_hz, 0.0);
    }

    #[test]
    fn test_manual_tune_applies_requested_duc() {
        let mut dev = SimDevice::new();
        let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();

        let probe = dev.tune(0, &plan.lo_request()).unwrap();
        for ch in 0..2 {
            let req = plan.channel_request(ch, probe.actual_rf_hz).unwrap();
            let res = dev.tune(ch, &req).unwrap();
            assert_eq!(res.actual_rf_hz, probe.actual_rf_hz);
            assert_eq!(res.overall_hz(), plan.tone_hz(ch).unwrap());
            assert_eq!(dev.tx_frequency(ch).unwrap(), plan.tone_hz(ch).unwrap());
        }
    }

    #[test]
    fn test_ref_lock_follows_bench_setup() {
        let mut dev = SimDevice::new();
        dev.set_clock_source(ClockSource::External).unwrap();
        assert_eq!(dev.ref_locked().unwrap(), Some(true));

        dev.set_external_ref_present(false);
        assert_eq!(dev.ref_locked().unwrap(), Some(false));

        // Internal clock always reports locked
        dev.set_clock_source(ClockSource::Internal).unwrap();
        assert_eq!(dev.ref_locked().unwrap(), Some(true));
    }

    #[test]
    fn test_lo_lock_requires_a_tune() {
        let mut dev = SimDevice::new();
        assert_eq!(dev.lo_locked(0).unwrap(), Some(false));
        let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
        dev.tune(0, &plan.lo_request()).unwrap();
        assert_eq!(dev.lo_locked(0).unwrap(), Some(true));
    }

    #[test]
    fn test_stream_requires_activation() {
        let mut dev = SimDevice::new();
        let buf = vec![IQSample::new(0.3, 0.3); 16];
        let mut stream = dev.tx_stream(&[0, 1]).unwrap();
        let err = stream.write(&[&buf, &buf], false).unwrap_err();
        assert!(matches!(err, SdrError::NotStarted));
    }

    #[test]
    fn test_stream_rejects_mismatched_buffers() {
        let mut dev = SimDevice::new();
        let a = vec![IQSample::new(0.3, 0.3); 16];
        let b = vec![IQSample::new(0.3, 0.3); 8];
        let mut stream = dev.tx_stream(&[0, 1]).unwrap();
        stream.activate().unwrap();
        assert!(stream.write(&[&a], false).is_err());
        assert!(stream.write(&[&a, &b], false).is_err());
    }

    #[test]
    fn test_stream_captures_samples_per_channel() {
        let mut dev = SimDevice::new();
        let buf = vec![IQSample::new(0.25, 0.25); 32];
        {
            let mut stream = dev.tx_stream(&[0, 1]).unwrap();
            stream.activate().unwrap();
            stream.write(&[&buf, &buf], false).unwrap();
            stream.write(&[&[], &[]], true).unwrap();
            stream.deactivate().unwrap();
        }
        assert_eq!(dev.captured(0), &buf[..]);
        assert_eq!(dev.captured(1), &buf[..]);
        assert_eq!(dev.buffers_written(), 1);
        assert_eq!(dev.samples_written(), 32);
        assert!(dev.end_burst_seen());
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        let mut dev = SimDevice::new();
        assert!(dev.set_tx_gain(5, 30.0).is_err());
        assert!(dev.tx_stream(&[0, 5]).is_err());
    }
}
