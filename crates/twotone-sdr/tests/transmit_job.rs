//! End-to-end transmit job against the software simulator.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use twotone_core::tune::TwoTonePlan;
use twotone_core::types::IQSample;
use twotone_sdr::device::{ClockSource, TxConfig, TxDevice};
use twotone_sdr::job::{RunControls, TransmitJob};
use twotone_sdr::simulator::SimDevice;

fn bounded_controls(max_samples: u64) -> RunControls {
    RunControls {
        stop: Arc::new(AtomicBool::new(false)),
        max_samples: Some(max_samples),
        settle: Duration::ZERO,
    }
}

#[test]
fn two_tone_job_tunes_streams_and_closes_the_burst() {
    let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
    let config = TxConfig {
        amplitude: 0.25,
        gain_db: Some(55.0),
        clock_source: ClockSource::External,
        ..Default::default()
    };

    let mut dev = SimDevice::new();
    let stats = TransmitJob::new(config, plan)
        .run(&mut dev, &bounded_controls(50_000))
        .unwrap();

    // The loop ran until the sample bound
    assert!(stats.samples >= 50_000);
    assert!(stats.buffers >= 1);

    // Both channels landed exactly on their tones, sharing the LO
    assert!((dev.tx_frequency(0).unwrap() - 915.0e6).abs() < 1e-3);
    assert!((dev.tx_frequency(1).unwrap() - 915.05e6).abs() < 1e-3);
    assert_eq!(dev.rf_hz(0), dev.rf_hz(1));

    // Configuration made it to the hardware
    assert_eq!(dev.clock_source(), ClockSource::External);
    assert_eq!(dev.gain_db(0), 55.0);
    assert_eq!(dev.gain_db(1), 55.0);

    // Every transmitted sample is the constant 0.25 + j0.25
    for ch in 0..2 {
        let captured = dev.captured(ch);
        assert!(!captured.is_empty());
        assert!(captured.iter().all(|s| *s == IQSample::new(0.25, 0.25)));
    }

    // Shutdown closed the burst
    assert!(dev.end_burst_seen());
}

#[test]
fn duc_offsets_compensate_a_quantized_lo() {
    // A 40 kHz synthesizer grid cannot hit the 915.025 MHz midpoint
    let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
    let mut dev = SimDevice::with_lo_step(40_000.0);

    TransmitJob::new(TxConfig::default(), plan)
        .run(&mut dev, &bounded_controls(1))
        .unwrap();

    // The LO sits off the midpoint, the DUCs absorb the difference
    assert_ne!(dev.rf_hz(0), plan.lo_target_hz());
    assert!((dev.rf_hz(0) + dev.duc_hz(0) - 915.0e6).abs() < 1e-3);
    assert!((dev.rf_hz(1) + dev.duc_hz(1) - 915.05e6).abs() < 1e-3);
}

#[test]
fn gain_is_left_alone_when_not_requested() {
    let plan = TwoTonePlan::new(915.0e6, 50.0e3).unwrap();
    let mut dev = SimDevice::new();

    TransmitJob::new(TxConfig::default(), plan)
        .run(&mut dev, &bounded_controls(1))
        .unwrap();

    assert_eq!(dev.gain_db(0), 0.0);
    assert_eq!(dev.gain_db(1), 0.0);
}
