//! Transmit job orchestration
//!
//! The configure/tune/verify/stream sequence for a two-tone transmission:
//!
//! 1. select the reference clock
//! 2. set the sample rate
//! 3. probe-tune the LO at the midpoint, then pin each channel's DUC
//! 4. settle, apply gain, verify lock sensors
//! 5. stream the constant buffer until stopped, then close the burst
//!
//! The loop runs forever by default; a stop flag (Ctrl-C) or a sample bound
//! (`--duration`, tests) ends it cleanly with an end-of-burst write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use twotone_core::tune::{duc_in_passband, TwoTonePlan};
use twotone_core::types::IQSample;
use twotone_core::waveform::make_buffer;

use crate::device::{ClockSource, SdrError, SdrResult, TxConfig, TxDevice};

/// Buffer length as a multiple of the stream MTU.
const BUFFERS_PER_MTU: usize = 10;

/// Counters reported when a job ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobStats {
    /// Buffers pushed to the stream
    pub buffers: u64,
    /// Samples pushed per channel
    pub samples: u64,
}

/// Run-time controls for a transmit job.
#[derive(Debug, Clone)]
pub struct RunControls {
    /// Cooperative stop flag, typically flipped by a Ctrl-C handler
    pub stop: Arc<AtomicBool>,
    /// Stop after this many samples per channel (`None` = run until stopped)
    pub max_samples: Option<u64>,
    /// Delay between tuning and streaming while the synthesizer settles
    pub settle: Duration,
}

impl Default for RunControls {
    fn default() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            max_samples: None,
            settle: Duration::from_secs(1),
        }
    }
}

/// A configured two-tone transmission.
pub struct TransmitJob {
    config: TxConfig,
    plan: TwoTonePlan,
}

impl TransmitJob {
    /// Bind a device configuration to a frequency plan.
    pub fn new(config: TxConfig, plan: TwoTonePlan) -> Self {
        Self { config, plan }
    }

    /// Execute the job on a device.
    pub fn run(&self, dev: &mut dyn TxDevice, controls: &RunControls) -> SdrResult<JobStats> {
        let config = &self.config;
        let plan = &self.plan;

        if config.channels.len() != TwoTonePlan::NUM_TONES {
            return Err(SdrError::ConfigError(format!(
                "Two-tone transmission needs exactly {} channels, got {:?}",
                TwoTonePlan::NUM_TONES,
                config.channels
            )));
        }

        info!("Using device: {}", dev.name());

        let available = dev.num_tx_channels()?;
        if let Some(&worst) = config.channels.iter().max() {
            if worst >= available {
                return Err(SdrError::ConfigError(format!(
                    "Device has {} TX channels, job needs channel {}",
                    available, worst
                )));
            }
        }

        dev.set_clock_source(config.clock_source)?;

        for &ch in &config.channels {
            let actual = dev.set_sample_rate(ch, config.sample_rate)?;
            if ch == config.channels[0] {
                info!("TX rate: {:.6} MS/s (requested {:.6})", actual / 1e6, config.sample_rate / 1e6);
            }
        }

        // Probe tune: park the LO near the midpoint and see where it lands
        let probe = dev.tune(config.channels[0], &plan.lo_request())?;
        info!(
            "Mid tune: RF = {:.6} MHz, DUC = {} Hz",
            probe.actual_rf_hz / 1e6,
            probe.actual_duc_hz
        );

        for (tone, &ch) in config.channels.iter().enumerate() {
            let request = plan.channel_request(tone, probe.actual_rf_hz)?;
            let result = dev.tune(ch, &request)?;
            info!(
                "Channel {}: target {:.6} MHz, RF = {:.6} MHz, DUC = {} Hz",
                ch,
                request.target_hz / 1e6,
                result.actual_rf_hz / 1e6,
                result.actual_duc_hz
            );

            if (result.overall_hz() - request.target_hz).abs() > 1.0 {
                warn!(
                    "Channel {} settled {:.1} Hz off target",
                    ch,
                    result.overall_hz() - request.target_hz
                );
            }
            if !duc_in_passband(result.actual_duc_hz, config.sample_rate) {
                warn!(
                    "Channel {} DUC offset {} Hz exceeds the {:.0} Hz passband; the tone will be attenuated",
                    ch,
                    result.actual_duc_hz,
                    config.sample_rate / 2.0
                );
            }
        }

        // Let the synthesizer settle before trusting the lock sensors
        thread::sleep(controls.settle);

        if let Some(gain) = config.gain_db {
            for &ch in &config.channels {
                let actual = dev.set_tx_gain(ch, gain)?;
                if ch == config.channels[0] {
                    info!("TX gain: {:.1} dB (requested {:.1})", actual, gain);
                }
            }
        }

        self.check_locks(dev)?;

        let mut stats = JobStats::default();
        let mut stream = dev.tx_stream(&config.channels)?;
        let buffer = make_buffer(stream.mtu()? * BUFFERS_PER_MTU, config.amplitude)?;
        let buffers: Vec<&[IQSample]> = config.channels.iter().map(|_| buffer.as_slice()).collect();

        stream.activate()?;
        info!(
            "Streaming {} samples per buffer on channels {:?}",
            buffer.len(),
            config.channels
        );

        loop {
            if controls.stop.load(Ordering::Relaxed) {
                info!("Stop requested");
                break;
            }
            if let Some(max) = controls.max_samples {
                if stats.samples >= max {
                    debug!("Sample bound reached");
                    break;
                }
            }
            let written = stream.write(&buffers, false)?;
            stats.buffers += 1;
            stats.samples += written as u64;
        }

        // Close the burst so the DAC ramps down instead of cutting off
        let empty: Vec<&[IQSample]> = vec![&[]; config.channels.len()];
        if let Err(e) = stream.write(&empty, true) {
            warn!("End-of-burst write failed: {}", e);
        }
        stream.deactivate()?;

        Ok(stats)
    }

    /// Verify lock sensors the way the original tool did: a sensor that is
    /// absent gets skipped, a sensor that reads false is fatal.
    fn check_locks(&self, dev: &mut dyn TxDevice) -> SdrResult<()> {
        match dev.lo_locked(self.config.channels[0])? {
            Some(true) => info!("TX LO locked"),
            Some(false) => {
                return Err(SdrError::HardwareError(
                    "TX LO failed to lock".to_string(),
                ))
            }
            None => debug!("LO lock sensor not exposed; skipping check"),
        }

        if self.config.clock_source == ClockSource::External {
            match dev.ref_locked()? {
                Some(true) => info!("Reference locked"),
                Some(false) => {
                    return Err(SdrError::HardwareError(
                        "Device failed to lock to the external reference".to_string(),
                    ))
                }
                None => debug!("Reference lock sensor not exposed; skipping check"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimDevice;
    use twotone_core::types::PlanError;

    fn quick_controls(max_samples: u64) -> RunControls {
        RunControls {
            stop: Arc::new(AtomicBool::new(false)),
            max_samples: Some(max_samples),
            settle: Duration::ZERO,
        }
    }

    #[test]
    fn test_job_rejects_wrong_channel_count() {
        let config = TxConfig {
            channels: vec![0],
            ..Default::default()
        };
        let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
        let mut dev = SimDevice::new();
        let err = TransmitJob::new(config, plan)
            .run(&mut dev, &quick_controls(0))
            .unwrap_err();
        assert!(matches!(err, SdrError::ConfigError(_)));
    }

    #[test]
    fn test_job_rejects_missing_hardware_channel() {
        let config = TxConfig {
            channels: vec![0, 7],
            ..Default::default()
        };
        let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
        let mut dev = SimDevice::new();
        let err = TransmitJob::new(config, plan)
            .run(&mut dev, &quick_controls(0))
            .unwrap_err();
        assert!(matches!(err, SdrError::ConfigError(_)));
    }

    #[test]
    fn test_job_rejects_hot_amplitude() {
        let config = TxConfig {
            amplitude: 0.9,
            ..Default::default()
        };
        let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
        let mut dev = SimDevice::new();
        let err = TransmitJob::new(config, plan)
            .run(&mut dev, &quick_controls(0))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            SdrError::from(PlanError::AmplitudeOutOfRange(0.9)).to_string()
        );
    }

    #[test]
    fn test_job_fails_when_external_ref_missing() {
        let config = TxConfig {
            clock_source: ClockSource::External,
            ..Default::default()
        };
        let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
        let mut dev = SimDevice::new();
        dev.set_external_ref_present(false);
        let err = TransmitJob::new(config, plan)
            .run(&mut dev, &quick_controls(0))
            .unwrap_err();
        assert!(matches!(err, SdrError::HardwareError(_)));
    }

    #[test]
    fn test_stop_flag_ends_the_loop() {
        let config = TxConfig::default();
        let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
        let mut dev = SimDevice::new();

        let controls = RunControls {
            stop: Arc::new(AtomicBool::new(true)), // already stopped
            max_samples: None,
            settle: Duration::ZERO,
        };
        let stats = TransmitJob::new(config, plan)
            .run(&mut dev, &controls)
            .unwrap();
        assert_eq!(stats.buffers, 0);
        assert!(dev.end_burst_seen());
    }
}
