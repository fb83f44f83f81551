//! Two-Tone RF Generator Command-Line Interface
//!
//! Configures an SDR transceiver and continuously transmits two constant
//! tones at `--freq` and `--freq + --sep`, sharing one local oscillator and
//! splitting the tones in the digital up-converters.
//!
//! For real hardware operations, build with the `hardware` feature; without
//! it only `--simulate` runs are available.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use twotone_core::tune::TwoTonePlan;
use twotone_core::waveform::validate_amplitude;
use twotone_sdr::device::{ClockSource, TxConfig, TxDevice};
use twotone_sdr::job::{JobStats, RunControls, TransmitJob};
use twotone_sdr::simulator::SimDevice;

#[derive(Parser)]
#[command(name = "twotone")]
#[command(author, version, about = "Two-tone RF generator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Device address args (e.g. "serial=31B9237")
    #[arg(long, default_value = "")]
    args: String,

    /// Lower RF frequency in Hz
    #[arg(long)]
    freq: Option<f64>,

    /// Separation between lower and upper RF frequency in Hz
    #[arg(long)]
    sep: Option<f64>,

    /// Amplitude of the waveform [0 to 0.7]
    #[arg(long, default_value_t = 0.3)]
    ampl: f32,

    /// Gain for the RF chain in dB
    #[arg(long)]
    gain: Option<f64>,

    /// Clock reference (internal, external, mimo, gpsdo)
    #[arg(long = "ref", default_value = "internal")]
    reference: String,

    /// TX sample rate in S/s
    #[arg(long, default_value_t = 625_000.0)]
    rate: f64,

    /// Stop after this many seconds of samples (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0.0)]
    duration: f64,

    /// Run against the software simulator instead of hardware
    #[arg(long)]
    simulate: bool,
}

/// Sample bound for a `--duration` run, `None` for run-forever.
fn max_samples_for(duration_s: f64, rate: f64) -> Option<u64> {
    if duration_s > 0.0 {
        Some((duration_s * rate).ceil() as u64)
    } else {
        None
    }
}

fn report(stats: &JobStats, rate: f64) {
    println!(
        "Transmitted {} buffers, {} samples per channel ({:.1} s of signal)",
        stats.buffers,
        stats.samples,
        stats.samples as f64 / rate
    );
    println!("Done!");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let Some(freq) = cli.freq else {
        anyhow::bail!("Please specify the center frequency with --freq");
    };
    let Some(sep) = cli.sep else {
        anyhow::bail!("Please specify the two-tone separation with --sep");
    };

    let plan = TwoTonePlan::new(freq, sep).context("Invalid frequency plan")?;
    validate_amplitude(cli.ampl).context("Invalid --ampl")?;
    let clock_source: ClockSource = cli
        .reference
        .parse()
        .with_context(|| format!("Invalid --ref '{}'", cli.reference))?;

    let config = TxConfig {
        args: cli.args.clone(),
        sample_rate: cli.rate,
        gain_db: cli.gain,
        amplitude: cli.ampl,
        clock_source,
        ..Default::default()
    };

    info!(
        "Two tones at {:.6} MHz and {:.6} MHz (separation {} Hz)",
        plan.lower_hz() / 1e6,
        plan.upper_hz() / 1e6,
        plan.separation_hz()
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            warn!("Got Ctrl-C, stopping after the current buffer");
            stop.store(true, Ordering::Relaxed);
        })
        .context("Failed to set Ctrl-C handler")?;
    }

    let controls = RunControls {
        stop,
        max_samples: max_samples_for(cli.duration, cli.rate),
        settle: Duration::from_secs(1),
    };

    let job = TransmitJob::new(config.clone(), plan);

    if cli.simulate {
        let mut dev = SimDevice::new();
        let stats = job
            .run(&mut dev, &controls)
            .context("Transmit job failed")?;
        info!("Simulator device: {}", dev.name());
        report(&stats, cli.rate);
        return Ok(());
    }

    run_hardware(&job, &config, &controls, cli.rate)
}

#[cfg(feature = "hardware")]
fn run_hardware(
    job: &TransmitJob,
    config: &TxConfig,
    controls: &RunControls,
    rate: f64,
) -> Result<()> {
    let mut dev =
        twotone_sdr::soapy::SoapyDevice::open(config).context("Failed to open the SDR device")?;
    let stats = job.run(&mut dev, controls).context("Transmit job failed")?;
    report(&stats, rate);
    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn run_hardware(
    _job: &TransmitJob,
    _config: &TxConfig,
    _controls: &RunControls,
    _rate: f64,
) -> Result<()> {
    anyhow::bail!(
        "Built without hardware support. Rebuild with --features hardware, or pass --simulate"
    )
}
