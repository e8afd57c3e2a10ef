//! Firmware bootloading for Asphodel devices
//!
//! Decodes compressed firmware images and writes them into a device's flash through its page
//! oriented bootloader. The transport that talks to the device is provided by the caller as an
//! implementation of [`Device`].
//!
//! ```no_run
//! use asphodel_flash::{progress, FirmwareImage, Orchestrator};
//! # fn connect() -> asphodel_flash::sim::SimulatedDevice { unimplemented!() }
//!
//! let image = FirmwareImage::from_bytes(&std::fs::read("device.firmware")?)?;
//! let mut device = connect();
//! let (progress, events) = progress::channel(progress::DEFAULT_PROGRESS_BOUND);
//!
//! std::thread::spawn(move || {
//!     for event in events {
//!         println!("{:?}", event);
//!     }
//! });
//!
//! Orchestrator::new().run(&mut device, &image, progress)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bootload;
pub mod compat;
pub mod device;
mod error;
pub mod firmware;
pub mod progress;
pub mod sim;

#[cfg(test)]
mod testutil;

pub use bootload::{
    force_application, force_bootloader, CancelToken, Orchestrator, RetryBudget, DEFAULT_TRIES,
};
pub use compat::{already_programmed, ensure_supported, is_supported};
pub use device::{Device, DeviceError, DeviceInfo, ErrorCode, Mode, VerifyOutcome};
pub use error::{Error, ImageError};
pub use firmware::{FirmwareImage, Page};
pub use progress::{Progress, ProgressEvent};
