//! SoapySDR hardware backend
//!
//! Drives real transmitters through libSoapySDR. The UHD module
//! (`soapysdr-module-uhd`) is the primary target since the tool was built
//! around a USRP B210, but any two-channel TX-capable device with RF/BB
//! frequency components works.
//!
//! Two driver quirks shape this backend:
//!
//! - UHD consumes the clock source as a device argument at make time, so the
//!   reference selection is folded into the args string when the device is
//!   opened rather than applied afterwards.
//! - The bound driver layer does not expose the sensor API, so
//!   `lo_locked`/`ref_locked` report `None` and the job logs and moves on.

use num_complex::Complex;
use soapysdr::Direction::Tx;
use tracing::{debug, info};
use twotone_core::tune::{TunePolicy, TuneRequest, TuneResult};
use twotone_core::types::IQSample;

use crate::device::{ClockSource, SdrError, SdrResult, TxConfig, TxDevice, TxStream};

/// Device args used when `--args` names no driver, matching the original
/// tool's unconditional `type=b200`.
const DEFAULT_DEVICE_ARGS: &str = "driver=uhd,type=b200";

/// Write timeout for one buffer, in microseconds.
const WRITE_TIMEOUT_US: i64 = 1_000_000;

fn driver_err(e: soapysdr::Error) -> SdrError {
    SdrError::HardwareError(e.to_string())
}

/// Build the full device args string: default driver, user args, and the
/// clock source when one was requested.
fn device_args(config: &TxConfig) -> SdrResult<String> {
    let user = config.args.trim();
    let has_driver = user
        .split(',')
        .any(|kv| kv.trim().starts_with("driver="));

    let mut args = if user.is_empty() {
        DEFAULT_DEVICE_ARGS.to_string()
    } else if has_driver {
        user.to_string()
    } else {
        format!("{},{}", DEFAULT_DEVICE_ARGS, user)
    };

    if config.clock_source != ClockSource::Internal {
        if !args.contains("driver=uhd") {
            return Err(SdrError::Unsupported(format!(
                "Clock reference '{}' is only supported on the uhd driver",
                config.clock_source
            )));
        }
        args.push_str(",clock_source=");
        args.push_str(config.clock_source.as_str());
    }

    Ok(args)
}

/// A transmitter reached through libSoapySDR.
pub struct SoapyDevice {
    dev: soapysdr::Device,
    name: String,
    clock_source: ClockSource,
}

impl SoapyDevice {
    /// Open the device described by `config`.
    pub fn open(config: &TxConfig) -> SdrResult<Self> {
        let args = device_args(config)?;
        info!("Creating the device with: [{}]...", args);

        let dev = soapysdr::Device::new(args.as_str()).map_err(|e| {
            SdrError::DeviceNotFound(format!("{} (args: {})", e, args))
        })?;

        let driver = dev.driver_key().map_err(driver_err)?;
        let hardware = dev.hardware_key().map_err(driver_err)?;
        let name = format!("{} ({})", hardware, driver);

        Ok(Self {
            dev,
            name,
            clock_source: config.clock_source,
        })
    }
}

impl TxDevice for SoapyDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_tx_channels(&self) -> SdrResult<usize> {
        self.dev.num_channels(Tx).map_err(driver_err)
    }

    fn set_clock_source(&mut self, source: ClockSource) -> SdrResult<()> {
        // Applied at open time via device args; only verify consistency here
        if source == self.clock_source {
            debug!("Clock source {} applied at device open", source);
            Ok(())
        } else {
            Err(SdrError::Unsupported(
                "Clock source is fixed at device open; reopen with the new reference".to_string(),
            ))
        }
    }

    fn set_sample_rate(&mut self, channel: usize, rate: f64) -> SdrResult<f64> {
        self.dev
            .set_sample_rate(Tx, channel, rate)
            .map_err(driver_err)?;
        self.dev.sample_rate(Tx, channel).map_err(driver_err)
    }

    fn tune(&mut self, channel: usize, request: &TuneRequest) -> SdrResult<TuneResult> {
        match (request.rf, request.duc) {
            (TunePolicy::Auto, TunePolicy::Auto) => {
                self.dev
                    .set_frequency(Tx, channel, request.target_hz, ())
                    .map_err(driver_err)?;
            }
            _ => {
                if let TunePolicy::Manual(rf) = request.rf {
                    self.dev
                        .set_component_frequency(Tx, channel, "RF", rf, ())
                        .map_err(driver_err)?;
                }
                match request.duc {
                    TunePolicy::Manual(duc) => {
                        self.dev
                            .set_component_frequency(Tx, channel, "BB", duc, ())
                            .map_err(driver_err)?;
                    }
                    TunePolicy::Auto => {
                        let rf = self
                            .dev
                            .component_frequency(Tx, channel, "RF")
                            .map_err(driver_err)?;
                        self.dev
                            .set_component_frequency(Tx, channel, "BB", request.target_hz - rf, ())
                            .map_err(driver_err)?;
                    }
                    TunePolicy::None => {}
                }
            }
        }

        let actual_rf_hz = self
            .dev
            .component_frequency(Tx, channel, "RF")
            .map_err(driver_err)?;
        let actual_duc_hz = self
            .dev
            .component_frequency(Tx, channel, "BB")
            .map_err(driver_err)?;
        Ok(TuneResult {
            actual_rf_hz,
            actual_duc_hz,
        })
    }

    fn tx_frequency(&self, channel: usize) -> SdrResult<f64> {
        self.dev.frequency(Tx, channel).map_err(driver_err)
    }

    fn set_tx_gain(&mut self, channel: usize, gain_db: f64) -> SdrResult<f64> {
        self.dev
            .set_gain(Tx, channel, gain_db)
            .map_err(driver_err)?;
        self.dev.gain(Tx, channel).map_err(driver_err)
    }

    fn lo_locked(&self, _channel: usize) -> SdrResult<Option<bool>> {
        // Sensor API not exposed by the bound driver layer
        Ok(None)
    }

    fn ref_locked(&self) -> SdrResult<Option<bool>> {
        Ok(None)
    }

    fn tx_stream<'a>(&'a mut self, channels: &[usize]) -> SdrResult<Box<dyn TxStream + 'a>> {
        let stream = self
            .dev
            .tx_stream::<Complex<f32>>(channels)
            .map_err(driver_err)?;
        Ok(Box::new(SoapyTxStream {
            stream,
            active: false,
        }))
    }
}

/// CF32 transmit stream over a SoapySDR device.
struct SoapyTxStream {
    stream: soapysdr::TxStream<Complex<f32>>,
    active: bool,
}

impl TxStream for SoapyTxStream {
    fn mtu(&self) -> SdrResult<usize> {
        self.stream.mtu().map_err(driver_err)
    }

    fn activate(&mut self) -> SdrResult<()> {
        self.stream.activate(None).map_err(driver_err)?;
        self.active = true;
        Ok(())
    }

    fn write(&mut self, buffers: &[&[IQSample]], end_burst: bool) -> SdrResult<usize> {
        if !self.active {
            return Err(SdrError::NotStarted);
        }
        self.stream
            .write(buffers, None, end_burst, WRITE_TIMEOUT_US)
            .map_err(|e| SdrError::StreamError(e.to_string()))
    }

    fn deactivate(&mut self) -> SdrResult<()> {
        self.stream.deactivate(None).map_err(driver_err)?;
        self.active = false;
        Ok(())
    }
}
