use std::collections::BTreeSet;

use log::{debug, info, warn};
use thiserror::Error;

use super::pass::run_pass;
use super::retry::{CancelToken, RetryBudget};
use super::DEFAULT_TRIES;
use crate::device::{Device, Mode};
use crate::firmware::FirmwareImage;
use crate::progress::Progress;
use crate::Error;

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("The retry budget must allow at least one try")]
    ZeroTries,
}

/// Drives a complete firmware update of a single device.
///
/// A bootload goes through three phases: entering the bootloader (skipped when the device handle
/// already accepts bootloader commands), programming and verifying every page, and starting the
/// application again. Device errors in any phase are recovered by reconnecting and trying again,
/// all paid for out of one shared `RetryBudget`. Once it runs out the last device error is
/// returned as `Error::RetryBudgetExhausted` and the device is left in whatever mode it was in.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    tries: u32,
    cancel: CancelToken,
}

pub struct OrchestratorBuilder {
    /// The shared retry budget, `DEFAULT_TRIES` if not set
    tries: Option<u32>,
    cancel: Option<CancelToken>,
}

impl OrchestratorBuilder {
    /// Sets the number of device failures the whole bootload may absorb
    pub fn tries(&mut self, tries: u32) -> &mut OrchestratorBuilder {
        self.tries = Some(tries);
        self
    }

    /// Sets the token used to cancel a running bootload
    pub fn cancel_token(&mut self, cancel: CancelToken) -> &mut OrchestratorBuilder {
        self.cancel = Some(cancel);
        self
    }

    /// Builds the final Orchestrator from this OrchestratorBuilder
    ///
    /// Returns the Orchestrator on success, a BuilderError otherwise
    pub fn build(&self) -> Result<Orchestrator, BuilderError> {
        let tries = self.tries.unwrap_or(DEFAULT_TRIES);

        if tries == 0 {
            return Err(BuilderError::ZeroTries);
        }

        Ok(Orchestrator {
            tries,
            cancel: self.cancel.clone().unwrap_or_default(),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> OrchestratorBuilder {
        OrchestratorBuilder {
            tries: None,
            cancel: None,
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Orchestrator {
        Orchestrator {
            tries: DEFAULT_TRIES,
            cancel: CancelToken::default(),
        }
    }
}

/// Per bootload values queried from the bootloader the first time it is reached
struct Setup {
    block_sizes: BTreeSet<u32>,
    /// Progress units accounted for verifying a single page
    verify_size: u64,
}

impl Setup {
    fn query<D: Device + ?Sized>(
        device: &mut D,
        image: &FirmwareImage,
        progress: &Progress,
    ) -> Result<Setup, Error> {
        match device.get_bootloader_info() {
            Ok(bootloader_info) => info!("Bootloader: {}", bootloader_info),
            Err(err) => warn!("Could not read bootloader info: {}", err),
        }

        let block_sizes: BTreeSet<u32> = device
            .get_bootloader_block_sizes()?
            .into_iter()
            .filter(|size| *size > 0)
            .collect();

        debug!("Bootloader block sizes: {:?}", block_sizes);

        let verify_size = match block_sizes.iter().next_back() {
            Some(size) => *size as u64,
            None => return Err(Error::NoBlockSizes),
        };
        let total = image.data_len() + verify_size * image.pages.len() as u64;

        progress.sizing(total);

        Ok(Setup {
            block_sizes,
            verify_size,
        })
    }
}

/// Runs `attempt` until it succeeds, spending one try from `budget` for every device error.
///
/// `attempt` is told whether it is a retry so it can recover the device first. Errors other than
/// device errors are returned right away. Cancellation is only observed before a retry, the first
/// attempt always runs.
fn with_retries<T, F>(
    budget: &mut RetryBudget,
    cancel: &CancelToken,
    mut attempt: F,
) -> Result<T, Error>
where
    F: FnMut(bool) -> Result<T, Error>,
{
    let mut retrying = false;

    loop {
        if retrying {
            cancel.check()?;
        }

        match attempt(retrying) {
            Ok(value) => return Ok(value),
            Err(Error::Device(err)) => budget.spend(err)?,
            Err(err) => return Err(err),
        }

        retrying = true;
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn new() -> Orchestrator {
        Orchestrator::default()
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    /// The token that cancels bootloads run by this orchestrator.
    ///
    /// Cancelling is permanent: every later `run` on this orchestrator, or on a clone of it, fails
    /// with `Error::Cancelled` before touching the device. Build a new orchestrator with a fresh
    /// token to bootload again.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Writes `image` to `device` and starts the new application.
    ///
    /// Blocks until the bootload is done. `progress` is consumed and closed when this returns;
    /// `ProgressEvent::Finished` is only sent if the bootload succeeded.
    pub fn run<D: Device + ?Sized>(
        &self,
        device: &mut D,
        image: &FirmwareImage,
        progress: Progress,
    ) -> Result<(), Error> {
        let mut budget = RetryBudget::new(self.tries);

        self.cancel.check()?;

        if device.supports_bootloader_commands() {
            info!("Device is already in bootloader mode");
        } else {
            self.enter_bootloader(device, &mut budget)?;
        }

        self.program(device, image, &progress, &mut budget)?;
        self.leave_bootloader(device, &progress, &mut budget)?;

        info!("Bootload finished with {} tries to spare", budget.remaining());

        progress.finish();

        Ok(())
    }

    fn enter_bootloader<D: Device + ?Sized>(
        &self,
        device: &mut D,
        budget: &mut RetryBudget,
    ) -> Result<(), Error> {
        info!("Jumping to bootloader");

        with_retries(budget, &self.cancel, |retrying| {
            // A failed reconnect means the device fell back to its application
            if retrying {
                device.reconnect(Mode::Application)?;
            }

            device.bootloader_jump()?;
            device.reconnect(Mode::Bootloader)?;

            Ok(())
        })
    }

    fn program<D: Device + ?Sized>(
        &self,
        device: &mut D,
        image: &FirmwareImage,
        progress: &Progress,
        budget: &mut RetryBudget,
    ) -> Result<(), Error> {
        let cancel = &self.cancel;
        let mut prepared: Option<Setup> = None;

        info!(
            "Programming {} pages ({} bytes)",
            image.pages.len(),
            image.data_len()
        );

        with_retries(budget, cancel, |retrying| {
            if retrying {
                device.reconnect(Mode::Bootloader)?;
            }

            let setup = match prepared.take() {
                Some(setup) => setup,
                None => Setup::query(&mut *device, image, progress)?,
            };

            let result = run_pass(
                &mut *device,
                image,
                &setup.block_sizes,
                setup.verify_size,
                progress,
                cancel,
            );

            prepared = Some(setup);

            result
        })
    }

    fn leave_bootloader<D: Device + ?Sized>(
        &self,
        device: &mut D,
        progress: &Progress,
        budget: &mut RetryBudget,
    ) -> Result<(), Error> {
        info!("Starting application");
        progress.status("Switching to main app...");

        with_retries(budget, &self.cancel, |retrying| {
            if retrying {
                device.reconnect(Mode::Bootloader)?;
            }

            device.bootloader_start_program()?;
            device.reconnect(Mode::Application)?;

            Ok(())
        })
    }
}
