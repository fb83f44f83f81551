//! # Two-Tone SDR Hardware Abstraction
//!
//! Device and stream interfaces for the two-tone RF generator, with two
//! backends:
//!
//! - **Simulator**: pure software device, always available, used by the test
//!   suite and by `--simulate` runs
//! - **SoapySDR**: real hardware (USRP B210 and friends) behind the
//!   `hardware` feature
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                twotone-cli                  │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │         TransmitJob (job module)            │
//! │   clock → rate → tune → gain → lock → loop  │
//! └─────────────────────────────────────────────┘
//!          │                        │
//!          ▼                        ▼
//!    ┌───────────┐           ┌─────────────┐
//!    │ Simulator │           │  SoapySDR   │
//!    │           │           │ (hardware)  │
//!    └───────────┘           └─────────────┘
//! ```

pub mod device;
pub mod job;
pub mod simulator;
#[cfg(feature = "hardware")]
pub mod soapy;

// Re-exports
pub use device::{ClockSource, SdrError, SdrResult, TxConfig, TxDevice, TxStream};
pub use job::{JobStats, RunControls, TransmitJob};
pub use simulator::SimDevice;
#[cfg(feature = "hardware")]
pub use soapy::SoapyDevice;
